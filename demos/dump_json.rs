extern crate mimetree;
extern crate serde_json;

use mimetree::MessagePart;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::process::exit;

fn main() {
    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("Usage: dump_json <path/to/file.eml>");
            exit(2);
        }
    };

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(error) => {
            eprintln!("{}: {}", path, error);
            exit(1);
        }
    };

    let part = match mimetree::parse(BufReader::new(file)) {
        Ok(part) => part,
        Err(error) => {
            eprintln!("{}: {}", path, error);
            exit(1);
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&MessagePart::from(&part)).unwrap()
    );
}
