#![allow(dead_code)]

#[derive(formkit::form::FormModel)]
struct Consent(String, String);

fn main() {}
