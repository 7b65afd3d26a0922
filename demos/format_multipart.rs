extern crate mimetree;

use mimetree::Part;
use std::str::from_utf8;

fn main() {
    let mut m = Part::new()
        .with_header("From", "NoBody <nobody@domain.tld>")
        .with_header("To", "Hei <hei@domain.tld>")
        .with_header("Subject", "Happy new year")
        .with_header("MIME-Version", "1.0")
        .with_header("Content-Type", "multipart/mixed")
        .with_child(
            Part::new()
                .with_header("Content-Type", "multipart/alternative")
                .with_child(
                    Part::new()
                        .with_header("Content-Type", "text/plain; charset=utf-8")
                        .with_header("Content-Transfer-Encoding", "quoted-printable")
                        .with_content("Привет, мир!"),
                )
                .with_child(
                    Part::new()
                        .with_header("Content-Type", "text/html; charset=utf-8")
                        .with_header("Content-Transfer-Encoding", "8bit")
                        .with_content("<p><b>Hello</b>, <i>world</i>!</p>"),
                ),
        )
        .with_child(
            Part::new()
                .with_header("Content-Type", "text/plain; charset=utf-8")
                .with_header("Content-Disposition", "attachment; filename=\"example.c\"")
                .with_header("Content-Transfer-Encoding", "base64")
                .with_content("int main() { return 0; }"),
        );

    let out = m.to_bytes().unwrap();
    println!("{}", from_utf8(&out).unwrap());
}
