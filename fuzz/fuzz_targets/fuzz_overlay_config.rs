#![no_main]

use cigi_overlay::OverlayConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if text.len() > 8192 {
        return;
    }

    let Ok(config) = OverlayConfig::from_json_str(text) else {
        return;
    };

    // load_json accepts exactly the documents that parse and validate.
    let errors = config.validate();
    assert_eq!(OverlayConfig::load_json(text).is_ok(), errors.is_empty());

    // A config survives its own serialization.
    if let Ok(encoded) = serde_json::to_string(&config) {
        if let Ok(decoded) = OverlayConfig::from_json_str(&encoded) {
            if errors.is_empty() {
                assert_eq!(decoded, config);
            }
        }
    }
});
