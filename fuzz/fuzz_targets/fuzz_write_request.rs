#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use s7_plc::{ItemCodec, ItemDescriptor, PacketBuilder, S7Value};

#[derive(Debug, Arbitrary)]
enum Input {
    Int(i64),
    Float(f64),
    Text(Vec<u8>),
    Array(Vec<i32>),
}

impl From<Input> for S7Value {
    fn from(input: Input) -> Self {
        match input {
            Input::Int(v) => S7Value::from(v as f64),
            Input::Float(v) => S7Value::from(v),
            Input::Text(v) => S7Value::Bytes(v),
            Input::Array(v) => S7Value::from(v),
        }
    }
}

const ADDRESSES: [&str; 6] = [
    "DB1.0:int8",
    "DB1.0:uint32",
    "DB1.0:float",
    "DB1.0.7:bit",
    "DB1.0:char[5]",
    "DB1.0:int16[4]",
];

fuzz_target!(|input: (u8, u16, Input)| {
    let (which, sequence, value) = input;
    let raw = ADDRESSES[which as usize % ADDRESSES.len()];
    let item = ItemDescriptor::parse(raw).expect("fixed address parses");

    if let Ok(prepared) = ItemCodec::prepare_write(&item, &value.into()) {
        let frame = PacketBuilder::write_request(sequence, &[prepared]).expect("one item fits");
        let declared = u16::from_be_bytes([frame[2], frame[3]]) as usize;
        assert_eq!(declared, frame.len());
    }
});
