use std::io::{self, Read};

use csv_bind::{FieldMapping, FieldRule, FieldType, Reader, ReaderBuilder};
use serde::Deserialize;

/// A reader that hands out its data in fixed chunks, one per `read` call.
struct Chunked<'a> {
    chunks: Vec<&'a [u8]>,
}

impl<'a> Read for Chunked<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.chunks.is_empty() {
            return Ok(0);
        }
        let chunk = self.chunks[0];
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n == chunk.len() {
            self.chunks.remove(0);
        } else {
            self.chunks[0] = &chunk[n..];
        }
        Ok(n)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    a: String,
    b: i64,
    c: Vec<String>,
}

fn mapping() -> FieldMapping {
    FieldMapping::builder()
        .field("a", FieldType::Str)
        .field("b", FieldType::Int)
        .rule(FieldRule::new("c", FieldType::Str).rest())
        .build()
        .unwrap()
}

fn read_all<R: Read>(rdr: Reader<csv_bind::CsvSource<R>, Row>) -> Vec<String> {
    rdr.into_iter()
        .map(|r| match r {
            Ok(row) => format!("{}:{}:{}", row.a, row.b, row.c.join("|")),
            Err(err) => format!("error@{:?}", err.as_bind_error().unwrap().line()),
        })
        .collect()
}

#[test]
fn test_chunks() {
    let input_chunks = vec![
        &b"# header comm"[..],
        &b"ent\n0aaaa,0,x\n1aaaa,1,\"y"[..],
        &b",z\"\n"[..],
        &b"2aaaa,two"[..],
        &b",q\n\n\n3aaaa,3\n4aaaa,4,p,,"[..],
        &b"r\n5aa"[..],
        &b"aa,5,#gone"[..],
        &b"\n"[..],
        &b"6aaa,6"[..],
    ];
    let want = vec![
        "0aaaa:0:x",
        "1aaaa:1:y,z",
        "error@Some(4)",
        "3aaaa:3:",
        "4aaaa:4:p||r",
        "6aaa:6:",
    ];

    let whole: Vec<u8> = input_chunks.concat();
    let rdr = Reader::from_reader(&whole[..], mapping()).unwrap();
    assert_eq!(read_all(rdr), want);

    for &capacity in &[1, 2, 7, 64] {
        let chunked = Chunked { chunks: input_chunks.clone() };
        let rdr = ReaderBuilder::new()
            .buffer_capacity(capacity)
            .from_reader(chunked, mapping())
            .unwrap();
        assert_eq!(read_all(rdr), want, "capacity {}", capacity);
    }
}
