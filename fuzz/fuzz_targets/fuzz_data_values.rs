#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::decoder::DataSection;
use mmdb_reader::entry_list::get_entry_data_list;
use mmdb_reader::path::get_value;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks a path; the rest is a raw data section
    let paths: [&[&str]; 4] = [&[], &["a"], &["0", "-1"], &["names", "en"]];
    let path = paths[usize::from(data[0]) % paths.len()];
    let section = DataSection::new(&data[1..]);

    let _ = section.decode_one(0);
    let _ = get_value(&section, 0, path);
    if let Ok(list) = get_entry_data_list(&section, 0) {
        let _ = list.dump_to_string(2);
        let _ = list.to_json();
    }
});
