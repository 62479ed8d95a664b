//! Minimal container reader used to check what the writer produces.
#![allow(dead_code)]

use std::collections::BTreeMap;

use avrow::codec::get_codec_by_name;
use avrow::schema::{Names, Schema};
use avrow::wire::unzigzag;
use avrow::{Record, Value};

pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_long(&mut self) -> i64 {
        let mut raw = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.buf[self.pos];
            self.pos += 1;
            raw |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            assert!(shift < 70, "varint too long");
        }
        unzigzag(raw)
    }

    pub fn read_fixed(&mut self, len: usize) -> &'a [u8] {
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        out
    }

    pub fn read_bytes(&mut self) -> &'a [u8] {
        let len = self.read_long();
        assert!(len >= 0, "negative length {len}");
        self.read_fixed(len as usize)
    }

    pub fn read_string(&mut self) -> String {
        String::from_utf8(self.read_bytes().to_vec()).expect("utf-8 string")
    }
}

pub struct Block {
    pub count: u64,
    /// Decompressed payload.
    pub data: Vec<u8>,
    pub sync_marker: [u8; 16],
}

pub struct Container {
    pub metadata: Vec<(String, Vec<u8>)>,
    pub sync_marker: [u8; 16],
    pub blocks: Vec<Block>,
}

impl Container {
    pub fn meta(&self, key: &str) -> Option<&[u8]> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_slice())
    }

    pub fn codec(&self) -> &str {
        std::str::from_utf8(self.meta("avro.codec").expect("codec entry")).expect("utf-8 codec")
    }

    pub fn schema(&self) -> Schema {
        let json = std::str::from_utf8(self.meta("avro.schema").expect("schema entry")).expect("utf-8 schema");
        Schema::parse(json).expect("stored schema parses")
    }

    /// Decode every record of every block.
    pub fn values(&self) -> Vec<Value> {
        let schema = self.schema();
        let names = schema.validate().expect("stored schema validates");
        let mut out = Vec::new();
        for block in &self.blocks {
            let mut cursor = Cursor::new(&block.data);
            for _ in 0..block.count {
                out.push(decode(&schema, &names, &mut cursor));
            }
            assert_eq!(cursor.remaining(), 0, "trailing bytes in block");
        }
        out
    }
}

pub fn read_container(bytes: &[u8]) -> Container {
    let mut cursor = Cursor::new(bytes);
    assert_eq!(cursor.read_fixed(4), b"Obj\x01");

    let mut metadata = Vec::new();
    loop {
        let count = cursor.read_long();
        if count == 0 {
            break;
        }
        let count = if count < 0 {
            cursor.read_long();
            -count
        } else {
            count
        };
        for _ in 0..count {
            let key = cursor.read_string();
            let value = cursor.read_bytes().to_vec();
            metadata.push((key, value));
        }
    }
    let sync_marker: [u8; 16] = cursor.read_fixed(16).try_into().expect("16 byte marker");

    let name = metadata
        .iter()
        .find(|(k, _)| k == "avro.codec")
        .map(|(_, v)| String::from_utf8(v.clone()).expect("utf-8 codec"))
        .unwrap_or_else(|| "null".to_string());
    let codec = get_codec_by_name(&name).expect("known codec");

    let mut blocks = Vec::new();
    while cursor.remaining() > 0 {
        let count = cursor.read_long();
        assert!(count > 0, "empty block on disk");
        let data = codec.decompress(cursor.read_bytes()).expect("block decompresses");
        let marker: [u8; 16] = cursor.read_fixed(16).try_into().expect("16 byte marker");
        blocks.push(Block { count: count as u64, data, sync_marker: marker });
    }
    Container { metadata, sync_marker, blocks }
}

pub fn decode(schema: &Schema, names: &Names, cursor: &mut Cursor<'_>) -> Value {
    match names.resolve(schema).expect("resolvable schema") {
        Schema::Null => Value::Null,
        Schema::Boolean => match cursor.read_fixed(1)[0] {
            0 => Value::Boolean(false),
            1 => Value::Boolean(true),
            b => panic!("bad boolean byte {b}"),
        },
        Schema::Int => Value::Int(i32::try_from(cursor.read_long()).expect("int in range")),
        Schema::Long => Value::Long(cursor.read_long()),
        Schema::Float => Value::Float(f32::from_le_bytes(cursor.read_fixed(4).try_into().unwrap())),
        Schema::Double => Value::Double(f64::from_le_bytes(cursor.read_fixed(8).try_into().unwrap())),
        Schema::Bytes => Value::Bytes(cursor.read_bytes().to_vec()),
        Schema::String => Value::String(cursor.read_string()),
        Schema::Record(record) => {
            let mut out = Record::named(record.name.clone());
            for field in &record.fields {
                let value = decode(&field.schema, names, cursor);
                out.fields.push((field.name.clone(), value));
            }
            Value::Record(out)
        }
        Schema::Enum(e) => {
            let index = cursor.read_long();
            Value::Enum(e.symbols[index as usize].clone())
        }
        Schema::Array(items) => {
            let mut out = Vec::new();
            read_blocks(cursor, |cursor| out.push(decode(items, names, cursor)));
            Value::Array(out)
        }
        Schema::Map(values) => {
            let mut out = BTreeMap::new();
            read_blocks(cursor, |cursor| {
                let key = cursor.read_string();
                out.insert(key, decode(values, names, cursor));
            });
            Value::Map(out)
        }
        Schema::Union(branches) => {
            let index = cursor.read_long();
            decode(&branches[index as usize], names, cursor)
        }
        Schema::Fixed(f) => Value::Fixed(cursor.read_fixed(f.size).to_vec()),
        Schema::Ref(name) => panic!("unresolved reference {name}"),
    }
}

fn read_blocks(cursor: &mut Cursor<'_>, mut item: impl FnMut(&mut Cursor<'_>)) {
    loop {
        let count = cursor.read_long();
        if count == 0 {
            return;
        }
        let count = if count < 0 {
            cursor.read_long();
            -count
        } else {
            count
        };
        for _ in 0..count {
            item(cursor);
        }
    }
}
