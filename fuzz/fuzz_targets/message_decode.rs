//! Message decoding must never panic, and whatever decodes must re-encode to
//! something that decodes to the same message.

#![no_main]

use lamport_proto::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = Message::decode(data) else {
        return;
    };

    let encoded = message.encode().expect("decoded message must encode");
    let decoded = Message::decode(&encoded).expect("re-encoded message must decode");
    assert_eq!(decoded, message);
});
