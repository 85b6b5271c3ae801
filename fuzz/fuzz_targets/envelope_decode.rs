//! Envelope decoding must never panic and never yield a self-addressed or
//! invalid envelope.

#![no_main]

use lamport_proto::Envelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = Envelope::decode(data) {
        assert_ne!(envelope.from, envelope.to);
        assert!(envelope.message.validate().is_ok());
    }
});
