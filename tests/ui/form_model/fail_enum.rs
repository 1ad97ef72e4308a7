#![allow(dead_code)]

#[derive(formkit::form::FormModel)]
enum Channel {
    Email,
    Sms,
}

fn main() {}
