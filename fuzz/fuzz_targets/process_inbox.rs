//! Feed decoded envelopes to a process: it may reject them, but must never
//! panic and must stay internally consistent either way.

#![no_main]

use lamport_core::{Process, ProcessId, ProtocolConfig};
use lamport_proto::Envelope;
use libfuzzer_sys::fuzz_target;

const MEMBERS: u32 = 4;

fuzz_target!(|data: &[u8]| {
    let me = ProcessId(0);
    let mut process = Process::new(me, (0..MEMBERS).map(ProcessId), ProtocolConfig::default());

    for chunk in data.split(|b| *b == 0xff) {
        if chunk.first() == Some(&0xfe) && process.can_request() {
            let _ = process.request();
            continue;
        }
        let Ok(envelope) = Envelope::decode(chunk) else {
            continue;
        };
        let _ = process.handle_message(envelope.from, &envelope.message);
        if process.may_enter() {
            let _ = process.enter(None);
            let _ = process.exit();
        }
        process.check_invariants().expect("process must stay consistent");
    }
});
