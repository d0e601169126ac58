#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // This should never crash or panic, even on garbage input
    if let Ok(db) = mmdb_reader::Database::from_bytes(data.to_vec()) {
        let _ = db.lookup("1.2.3.4");
        let _ = db.lookup("::ffff:1.2.3.4");
        let _ = db.read_node(0);
        if let Ok(list) = db.metadata_entry_data_list() {
            let _ = list.dump_to_string(0);
        }
    }
});
