#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(forms) = gisp::parser::parse_program(s) {
            let _ = gisp::Gisp::with_core().eval(&forms);
        }
        let _ = gisp::Gisp::with_core().parse(s);
    }
});
