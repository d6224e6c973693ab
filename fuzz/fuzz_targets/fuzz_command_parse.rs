#![no_main]

use crimson::command::Command;
use crimson::resp::parse_frame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok((frame, _)) = parse_frame(data) else {
        return;
    };
    // A command that parses must survive its own journal form.
    if let Ok(cmd) = Command::try_from(frame) {
        let _ = cmd.name();
        let reparsed = Command::try_from(cmd.to_frame());
        assert!(reparsed.is_ok(), "{cmd:?} did not reparse");
    }
});
