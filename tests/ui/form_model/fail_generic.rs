#![allow(dead_code)]

#[derive(formkit::form::FormModel)]
struct Draft<T> {
    value: T,
}

fn main() {}
