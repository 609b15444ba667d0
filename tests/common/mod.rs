//! Builds complete encrypted CZDB images for integration tests.

#![allow(dead_code)]

use aes::Aes128;
use base64::{Engine, engine::general_purpose};
use cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
use rmpv::{Value, encode::write_value};
use std::io::Write;
use std::net::IpAddr;
use tempfile::NamedTempFile;

pub const KEY_BYTES: [u8; 16] = *b"czdb-test-key-01";
pub const CLIENT_ID: u32 = 1024;
pub const FAR_FUTURE: u32 = 991231;

pub fn key() -> String {
    general_purpose::STANDARD.encode(KEY_BYTES)
}

pub fn ip_bytes(ip: &str) -> Vec<u8> {
    match ip.parse::<IpAddr>().unwrap() {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

pub fn aes_encrypt(plain: &[u8]) -> Vec<u8> {
    let cipher = Aes128::new_from_slice(&KEY_BYTES).unwrap();
    let mut data = plain.to_vec();
    for block in data.chunks_exact_mut(16) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    data
}

pub fn xor(data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(KEY_BYTES.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Plain header prefix, encrypted secret and random padding.
pub fn hyper_header(client_id: u32, expiration: u32, padding: usize) -> Vec<u8> {
    let mut secret = [0u8; 16];
    secret[..4].copy_from_slice(&((client_id << 20) | expiration).to_le_bytes());
    secret[4..8].copy_from_slice(&(padding as i32).to_le_bytes());
    secret[8..].copy_from_slice(&[0x42; 8]);
    let encrypted = aes_encrypt(&secret);

    let mut out = Vec::new();
    out.extend_from_slice(&2i32.to_le_bytes());
    out.extend_from_slice(&(client_id as i32).to_le_bytes());
    out.extend_from_slice(&(encrypted.len() as i32).to_le_bytes());
    out.extend_from_slice(&encrypted);
    out.resize(out.len() + padding, 0xEE);
    out
}

pub fn super_block(ipv6: bool, db_size: usize, start: usize, header: usize, end: usize) -> Vec<u8> {
    let mut out = vec![u8::from(ipv6)];
    for v in [db_size, start, header, end] {
        out.extend_from_slice(&(v as i32).to_le_bytes());
    }
    out
}

pub fn header_entry(ip: &[u8], ptr: usize) -> Vec<u8> {
    let mut out = [0u8; 20];
    out[..ip.len()].copy_from_slice(ip);
    out[16..].copy_from_slice(&(ptr as u32).to_le_bytes());
    out.to_vec()
}

pub fn index_record(start: &[u8], end: &[u8], ptr: usize, len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(start);
    out.extend_from_slice(end);
    out.extend_from_slice(&(ptr as u32).to_le_bytes());
    out.push(len as u8);
    out
}

pub fn region_record(geo_pos_mix_size: u64, fallback: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, &Value::from(geo_pos_mix_size)).unwrap();
    write_value(&mut out, &Value::String(fallback.into())).unwrap();
    out
}

pub fn geo_columns(columns: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    let values = columns.iter().map(|c| Value::String((*c).into())).collect();
    write_value(&mut out, &Value::Array(values)).unwrap();
    out
}

#[derive(Debug, Clone)]
pub enum Region {
    Plain(String),
    Geo {
        columns: Vec<String>,
        fallback: String,
    },
}

impl Region {
    pub fn plain(s: &str) -> Self {
        Region::Plain(s.to_string())
    }

    pub fn geo(columns: &[&str], fallback: &str) -> Self {
        Region::Geo {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            fallback: fallback.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Range {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
    pub region: Region,
}

/// Layout facts of a built image, as absolute file offsets.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub data_offset: usize,
    pub header_start: usize,
    pub index_start: usize,
    pub stride: usize,
}

impl Layout {
    pub fn header_entry_ptr(&self, entry: usize) -> usize {
        self.header_start + entry * 20 + 16
    }

    pub fn record_ptr(&self, record: usize) -> usize {
        self.index_start + record * self.stride + self.stride - 5
    }
}

pub struct DbBuilder {
    ipv6: bool,
    ranges: Vec<Range>,
    column_selection: u32,
    records_per_block: usize,
    padding: usize,
    client_id: u32,
    expiration: u32,
}

impl DbBuilder {
    pub fn ipv4() -> Self {
        Self::new(false)
    }

    pub fn ipv6() -> Self {
        Self::new(true)
    }

    fn new(ipv6: bool) -> Self {
        Self {
            ipv6,
            ranges: Vec::new(),
            column_selection: 0,
            records_per_block: 4,
            padding: 13,
            client_id: CLIENT_ID,
            expiration: FAR_FUTURE,
        }
    }

    pub fn range(mut self, start: &str, end: &str, region: Region) -> Self {
        self.ranges.push(Range {
            start: ip_bytes(start),
            end: ip_bytes(end),
            region,
        });
        self
    }

    pub fn raw_range(mut self, start: Vec<u8>, end: Vec<u8>, region: Region) -> Self {
        self.ranges.push(Range { start, end, region });
        self
    }

    pub fn column_selection(mut self, mask: u32) -> Self {
        self.column_selection = mask;
        self
    }

    pub fn records_per_block(mut self, n: usize) -> Self {
        self.records_per_block = n.max(1);
        self
    }

    pub fn padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn expiration(mut self, yymmdd: u32) -> Self {
        self.expiration = yymmdd;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with_layout().0
    }

    pub fn build_with_layout(&self) -> (Vec<u8>, Layout) {
        assert!(!self.ranges.is_empty(), "at least one range is required");
        let width = if self.ipv6 { 16 } else { 4 };
        let stride = width * 2 + 5;
        let mut ranges = self.ranges.clone();
        ranges.sort_by(|a, b| a.start.cmp(&b.start));

        let mut geo_plain = Vec::new();
        let mut payloads = Vec::new();
        for range in &ranges {
            let payload = match &range.region {
                Region::Plain(text) => region_record(0, text),
                Region::Geo { columns, fallback } => {
                    let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
                    let encoded = geo_columns(&cols);
                    let mix = ((encoded.len() as u64) << 24) | geo_plain.len() as u64;
                    geo_plain.extend_from_slice(&encoded);
                    region_record(mix, fallback)
                }
            };
            payloads.push(payload);
        }

        let block_starts: Vec<usize> = (0..ranges.len()).step_by(self.records_per_block).collect();
        // trailing zero-pointer entry terminates the scan
        let header_size = (block_starts.len() + 1) * 20;
        let regions_start = 17 + header_size;
        let mut region_ptrs = Vec::new();
        let mut region_area = Vec::new();
        for payload in &payloads {
            region_ptrs.push(regions_start + region_area.len());
            region_area.extend_from_slice(payload);
        }
        let index_start = regions_start + region_area.len();
        let end_index = index_start + (ranges.len() - 1) * stride;

        let mut header = Vec::new();
        for &k in &block_starts {
            header.extend(header_entry(&ranges[k].start, index_start + k * stride));
        }
        header.extend(header_entry(&[0xFF; 16], 0));

        let mut index = Vec::new();
        for (range, (&ptr, payload)) in ranges.iter().zip(region_ptrs.iter().zip(&payloads)) {
            index.extend(index_record(&range.start, &range.end, ptr, payload.len()));
        }

        let mut tail = self.column_selection.to_le_bytes().to_vec();
        if self.column_selection != 0 {
            // region pointers are bounds checked against the geo section
            if geo_plain.len() < index_start {
                geo_plain.resize(index_start, 0);
            }
            tail.extend_from_slice(&(geo_plain.len() as i32).to_le_bytes());
            tail.extend(xor(&geo_plain));
        }

        let db_size = 17 + header.len() + region_area.len() + index.len() + tail.len();
        let mut data = super_block(self.ipv6, db_size, index_start, header_size, end_index);
        data.extend(header);
        data.extend(region_area);
        data.extend(index);
        data.extend(tail);

        let mut out = hyper_header(self.client_id, self.expiration, self.padding);
        let data_offset = out.len();
        out.extend(data);
        let layout = Layout {
            data_offset,
            header_start: data_offset + 17,
            index_start: data_offset + index_start,
            stride,
        };
        (out, layout)
    }

    pub fn write(&self) -> NamedTempFile {
        write_temp(&self.build())
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}
