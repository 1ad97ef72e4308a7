use formkit::form::{FieldLens, FormModel};

#[derive(Clone, formkit::form::FormModel)]
struct NewsletterForm {
    email: String,
    favourite_topic: String,
}

fn main() {
    let fields = NewsletterForm::fields();
    let lens = fields.email();
    let mut model = NewsletterForm {
        email: "a@example.com".to_string(),
        favourite_topic: String::new(),
    };
    lens.set(&mut model, "b@example.com".to_string());
    fields.favourite_topic().set(&mut model, "rust".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@example.com");
    assert_eq!(model.favourite_topic, "rust");
    assert_eq!(fields.favourite_topic().key().as_str(), "favourite_topic");
    assert_eq!(NewsletterForm::field_keys().len(), 2);
}
