use heck::ToSnakeCase;
use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Path};

/// Struct-level `#[outboxable(...)]` settings.
#[derive(Default)]
struct Settings {
    name: Option<String>,
    table: Option<String>,
    validate: Option<Path>,
}

pub fn derive_outboxable(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let settings = match extract_settings(&input) {
        Ok(settings) => settings,
        Err(err) => return err.to_compile_error().into(),
    };

    let identifier_field = match extract_identifier_field(&input) {
        Ok(field) => field,
        Err(err) => return err.to_compile_error().into(),
    };

    let type_name = settings.name.unwrap_or_else(|| name.to_string());
    let table = settings
        .table
        .unwrap_or_else(|| format!("{}s", name.to_string().to_snake_case()));

    let validate = settings.validate.map(|path| {
        quote! {
            fn validate(&self, errors: &mut transactional_outbox::Errors) {
                #path(self, errors)
            }
        }
    });

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics transactional_outbox::Outboxable for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;
            const TABLE: &'static str = #table;

            fn identifier(&self) -> transactional_outbox::AggregateIdentifier {
                transactional_outbox::AggregateIdentifier::from(
                    ::core::clone::Clone::clone(&self.#identifier_field),
                )
            }

            #validate
        }
    };

    TokenStream::from(expanded)
}

fn extract_settings(input: &DeriveInput) -> syn::Result<Settings> {
    let mut settings = Settings::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("outboxable") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                settings.name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                settings.table = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("validate") {
                settings.validate = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `name`, `table` or `validate`"))
            }
        })?;
    }

    Ok(settings)
}

fn extract_identifier_field(input: &DeriveInput) -> syn::Result<syn::Ident> {
    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Outboxable can only be derived for structs",
        ));
    };

    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Outboxable requires a struct with named fields",
        ));
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("outboxable") {
                continue;
            }
            let mut is_identifier = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("identifier") {
                    is_identifier = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `identifier`"))
                }
            })?;
            if is_identifier {
                if let Some(ident) = &field.ident {
                    return Ok(ident.clone());
                }
            }
        }
    }

    // Default: a field named `identifier`, then `id`
    for candidate in ["identifier", "id"] {
        for field in &fields.named {
            if let Some(ident) = &field.ident {
                if ident == candidate {
                    return Ok(ident.clone());
                }
            }
        }
    }

    Err(syn::Error::new_spanned(
        &input.ident,
        "Outboxable derive: no field marked with #[outboxable(identifier)] and no field named `identifier` or `id`",
    ))
}
