//! Decode fuzz target: feed arbitrary payloads to every built-in characteristic.
//! Decode must not panic; it returns fields, a raw passthrough, or an error.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use std::sync::OnceLock;
    static CODEC: OnceLock<gattpacket::GattCodec> = OnceLock::new();
    let codec = CODEC.get_or_init(|| gattpacket::GattCodec::with_builtin().expect("builtin table"));

    // First byte picks the characteristic; the rest is the payload.
    let Some((&pick, payload)) = data.split_first() else {
        return;
    };
    let ids = codec.registry().ids();
    let id = ids[pick as usize % ids.len()];
    if let Ok(gattpacket::Decoded::Fields(fields)) = codec.decode(id, payload) {
        // Whatever decodes must encode again.
        let _ = codec.encode(id, &fields);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
