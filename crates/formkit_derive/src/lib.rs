use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Type, Visibility, parse_macro_input};

/// Derives `formkit::form::FormModel` for a struct with named fields.
///
/// For `struct Signup { email: String }` this generates:
///
/// - `SignupEmailLens`, a zero-sized `FieldLens<Signup>` per field;
/// - `SignupFields`, with one `const fn` per field returning its lens;
/// - `SignupRules`, one `FieldRules` per field, passed to `register_all`;
/// - `SignupBindings`, one `FieldBinding` per field, returned by it.
///
/// Every field type must implement `FieldValue`.
#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct ModelField {
    ident: Ident,
    ty: Type,
    name: String,
    lens: Ident,
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "FormModel derive supports only non-generic structs",
        ));
    }

    let named = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "FormModel derive requires a struct with named fields",
                ));
            }
        },
        Data::Enum(data) => {
            return Err(syn::Error::new_spanned(
                data.enum_token,
                "FormModel derive is only supported on structs",
            ));
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(
                data.union_token,
                "FormModel derive is only supported on structs",
            ));
        }
    };

    let model = &input.ident;
    let fields = named
        .into_iter()
        .filter_map(|field| {
            let ident = field.ident?;
            let name = ident.to_string();
            let lens = format_ident!("{model}{}Lens", to_pascal_case(&name));
            Some(ModelField {
                ident,
                ty: field.ty,
                name,
                lens,
            })
        })
        .collect::<Vec<_>>();

    let formkit = formkit_path();
    let lenses = fields.iter().map(|field| lens_def(&formkit, model, field));
    let accessors = accessor_struct(model, &fields);
    let model_impl = model_impl(&formkit, model, &input.vis, &fields);

    Ok(quote! {
        #accessors
        #model_impl
        #(#lenses)*
    })
}

fn lens_def(formkit: &TokenStream2, model: &Ident, field: &ModelField) -> TokenStream2 {
    let ModelField {
        ident,
        ty,
        name,
        lens,
    } = field;

    // Spanned on the field type so a missing `FieldValue` impl is reported there.
    let value_check = quote_spanned! {ty.span()=>
        const _: fn() = || {
            fn require_field_value<V: #formkit::form::FieldValue>() {}
            require_field_value::<#ty>();
        };
    };

    quote! {
        #value_check

        #[derive(Clone, Copy, Debug, Default)]
        pub struct #lens;

        impl #formkit::form::FieldLens<#model> for #lens {
            type Value = #ty;

            fn key(self) -> #formkit::form::FieldKey {
                #formkit::form::FieldKey::new(#name)
            }

            fn get<'a>(self, model: &'a #model) -> &'a Self::Value {
                &model.#ident
            }

            fn set(self, model: &mut #model, value: Self::Value) {
                model.#ident = value;
            }
        }
    }
}

fn accessor_struct(model: &Ident, fields: &[ModelField]) -> TokenStream2 {
    let accessors = format_ident!("{model}Fields");
    let methods = fields.iter().map(|ModelField { ident, lens, .. }| {
        quote! {
            pub const fn #ident(&self) -> #lens {
                #lens
            }
        }
    });

    quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #accessors;

        impl #accessors {
            #(#methods)*
        }
    }
}

fn model_impl(
    formkit: &TokenStream2,
    model: &Ident,
    vis: &Visibility,
    fields: &[ModelField],
) -> TokenStream2 {
    let accessors = format_ident!("{model}Fields");
    let rules = format_ident!("{model}Rules");
    let bindings = format_ident!("{model}Bindings");

    let idents = fields.iter().map(|field| &field.ident).collect::<Vec<_>>();
    let keys = fields.iter().map(|ModelField { name, .. }| {
        quote!(#formkit::form::FieldKey::new(#name))
    });
    let rule_fields = fields.iter().map(|ModelField { ident, ty, .. }| {
        quote!(#vis #ident: #formkit::form::FieldRules<#ty>)
    });
    let binding_fields = fields.iter().map(|ModelField { ident, lens, .. }| {
        quote!(#vis #ident: #formkit::form::FieldBinding<#model, #lens>)
    });

    quote! {
        #vis struct #rules {
            #(#rule_fields,)*
        }

        impl ::core::default::Default for #rules {
            fn default() -> Self {
                Self {
                    #(#idents: ::core::default::Default::default(),)*
                }
            }
        }

        #vis struct #bindings {
            #(#binding_fields,)*
        }

        impl #formkit::form::FormModel for #model {
            type Fields = #accessors;
            type Rules = #rules;
            type Bindings = #bindings;

            fn fields() -> Self::Fields {
                #accessors
            }

            fn field_keys() -> &'static [#formkit::form::FieldKey] {
                const KEYS: &[#formkit::form::FieldKey] = &[#(#keys),*];
                KEYS
            }

            fn register_all(
                controller: &#formkit::form::FormController<Self>,
                rules: Self::Rules,
            ) -> #formkit::form::FormResult<Self::Bindings> {
                let fields = <Self as #formkit::form::FormModel>::fields();
                ::core::result::Result::Ok(#bindings {
                    #(#idents: controller.register(fields.#idents(), rules.#idents)?,)*
                })
            }
        }
    }
}

fn formkit_path() -> TokenStream2 {
    match crate_name("formkit") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Ok(FoundCrate::Itself) => quote!(crate),
        Err(_) => quote!(::formkit),
    }
}

fn to_pascal_case(input: &str) -> String {
    input
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        })
        .collect()
}
