#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::metadata::METADATA_MARKER;

// Fixed IPv6 tree with a single node: ::/1 -> data, 8000::/1 -> empty,
// followed by a one-string data section
fn database() -> Vec<u8> {
    fn key(out: &mut Vec<u8>, s: &str) {
        out.push(0x40 | s.len() as u8);
        out.extend_from_slice(s.as_bytes());
    }

    let mut db = vec![0, 0, 17, 0, 0, 1];
    db.extend_from_slice(&[0u8; 16]);
    db.extend_from_slice(&[0x42, b'o', b'k']);
    db.extend_from_slice(METADATA_MARKER);
    db.push(0xe9);
    key(&mut db, "node_count");
    db.extend_from_slice(&[0xc1, 1]);
    key(&mut db, "record_size");
    db.extend_from_slice(&[0xa1, 24]);
    key(&mut db, "ip_version");
    db.extend_from_slice(&[0xa1, 6]);
    key(&mut db, "database_type");
    key(&mut db, "Fuzz");
    key(&mut db, "languages");
    db.extend_from_slice(&[0x00, 0x04]);
    key(&mut db, "binary_format_major_version");
    db.extend_from_slice(&[0xa1, 2]);
    key(&mut db, "binary_format_minor_version");
    db.push(0xa0);
    key(&mut db, "build_epoch");
    db.extend_from_slice(&[0x01, 0x02, 1]);
    key(&mut db, "description");
    db.push(0xe0);
    db
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(db) = mmdb_reader::Database::from_bytes(database()) else {
        return;
    };

    // Address parsing edge cases, malformed IPs, etc.
    if let Ok(result) = db.lookup(text) {
        if let Some(entry) = result.entry() {
            let _ = entry.get_value(&text.split('/').collect::<Vec<_>>());
        }
    }
});
