#![no_main]

use libfuzzer_sys::fuzz_target;
use s7_plc::ItemDescriptor;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(item) = ItemDescriptor::parse(raw) {
        // canonical form must parse back to the same item
        let again = ItemDescriptor::parse(&item.to_string()).expect("canonical address parses");
        assert_eq!(again.data_block, item.data_block);
        assert_eq!(again.byte_offset, item.byte_offset);
        assert_eq!(again.bit_offset, item.bit_offset);
        assert_eq!(again.type_id, item.type_id);
        assert_eq!(again.element_count, item.element_count);
    }
});
