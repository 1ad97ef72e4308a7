use formkit::form::{FieldRules, FormController, FormOptions};

#[derive(Clone, Default, formkit::form::FormModel)]
struct ContactForm {
    full_name: String,
    company: String,
}

fn main() {
    let controller = FormController::new(ContactForm::default(), FormOptions::default());
    let contact = controller
        .register_all(ContactFormRules {
            full_name: FieldRules::new().required("required"),
            ..ContactFormRules::default()
        })
        .expect("register fields");
    let _ = contact.full_name.input("Ada").expect("input");
    assert_eq!(contact.full_name.value().expect("value"), "Ada");
    assert_eq!(contact.company.key().as_str(), "company");
    assert!(controller.unregistered_fields().expect("keys").is_empty());
}
