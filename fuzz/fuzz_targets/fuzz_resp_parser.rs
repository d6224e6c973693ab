#![no_main]

use bytes::BytesMut;
use crimson::resp::{RespCodec, encode_frame, parse_frame};
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Must never panic, and a decoded frame must re-encode to bytes that
    // decode to the same frame.
    if let Ok((frame, used)) = parse_frame(data) {
        assert!(used <= data.len());
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf);
        if let Ok((again, _)) = parse_frame(&buf) {
            let mut reencoded = BytesMut::new();
            encode_frame(&again, &mut reencoded);
            assert_eq!(buf, reencoded);
        }
    }

    // Feed the codec in two pieces to exercise partial reads.
    let mut codec = RespCodec::new(64 * 1024);
    let split = data.len() / 2;
    let mut buf = BytesMut::from(&data[..split]);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
    buf.extend_from_slice(&data[split..]);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
