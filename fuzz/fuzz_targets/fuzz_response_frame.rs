#![no_main]

use libfuzzer_sys::fuzz_target;
use s7_plc::parser::{parse_connect_confirm, parse_read_response, parse_setup_response, parse_write_response};
use s7_plc::parse_items;

// Arbitrary frames must only ever produce errors, never panics.
fuzz_target!(|frame: &[u8]| {
    let items = parse_items(&["DB1.0:int32", "DB1.4:string[8]", "DB1.20.1:bit", "DB1.22:int16[3]"])
        .expect("fixed addresses parse");

    let _ = parse_read_response(frame, 1, &items);
    let _ = parse_write_response(frame, 1, &["DB1.0:int32", "DB1.4:float"]);
    let _ = parse_connect_confirm(frame);
    let _ = parse_setup_response(frame);
});
