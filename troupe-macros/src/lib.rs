use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident};

#[derive(Clone, Copy)]
enum ReducerChoice {
    Replace,
    Append,
    ShallowMerge,
    Union,
}

impl ReducerChoice {
    fn path(self) -> TokenStream2 {
        match self {
            ReducerChoice::Replace => quote!(::troupe_core::Replace),
            ReducerChoice::Append => quote!(::troupe_core::Append),
            ReducerChoice::ShallowMerge => quote!(::troupe_core::ShallowMerge),
            ReducerChoice::Union => quote!(::troupe_core::Union),
        }
    }

    fn kind(self) -> TokenStream2 {
        match self {
            ReducerChoice::Replace => quote!(::troupe_core::ReducerKind::Replace),
            ReducerChoice::Append => quote!(::troupe_core::ReducerKind::Append),
            ReducerChoice::ShallowMerge => quote!(::troupe_core::ReducerKind::ShallowMerge),
            ReducerChoice::Union => quote!(::troupe_core::ReducerKind::Union),
        }
    }
}

fn reducer_of(attrs: &[Attribute]) -> syn::Result<ReducerChoice> {
    let mut choice: Option<ReducerChoice> = None;
    for attr in attrs {
        if !attr.path().is_ident("reducer") {
            continue;
        }
        if choice.is_some() {
            return Err(syn::Error::new_spanned(attr, "duplicate #[reducer] attribute"));
        }
        let name: Ident = attr.parse_args()?;
        choice = Some(match name.to_string().as_str() {
            "replace" => ReducerChoice::Replace,
            "append" => ReducerChoice::Append,
            "merge" | "shallow_merge" => ReducerChoice::ShallowMerge,
            "union" => ReducerChoice::Union,
            other => {
                return Err(syn::Error::new_spanned(
                    name,
                    format!(
                        "unknown reducer `{other}`, expected one of: replace, append, merge, union"
                    ),
                ))
            }
        });
    }
    Ok(choice.unwrap_or(ReducerChoice::Replace))
}

/// Derives `troupe_core::StateSchema` for a struct with named fields.
///
/// Every field is a state key. `#[reducer(append)]`, `#[reducer(merge)]` and
/// `#[reducer(union)]` pick the merge policy; unannotated keys use `replace`.
/// A `<Name>Update` struct is generated with one optional value per key and
/// a builder-style setter per key.
#[proc_macro_derive(StateSchema, attributes(reducer))]
pub fn derive_state_schema(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "StateSchema cannot be derived for generic structs",
        ));
    }
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "StateSchema requires named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "StateSchema can only be derived for structs",
            ))
        }
    };

    let name = &input.ident;
    let vis = &input.vis;
    let update_name = format_ident!("{}Update", name);
    let update_doc = format!("Partial update of [`{name}`]: one optional value per key.");

    let mut update_fields = Vec::new();
    let mut setters = Vec::new();
    let mut key_checks = Vec::new();
    let mut merges = Vec::new();
    let mut specs = Vec::new();

    for field in named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let key = ident.unraw().to_string();
        let reducer = reducer_of(&field.attrs)?;
        let reducer_path = reducer.path();
        let reducer_kind = reducer.kind();
        let setter_doc = format!("Writes `{key}`.");

        update_fields.push(quote! {
            #[serde(default, skip_serializing_if = "::core::option::Option::is_none")]
            pub #ident: ::core::option::Option<#ty>,
        });
        setters.push(quote! {
            #[doc = #setter_doc]
            pub fn #ident(mut self, value: #ty) -> Self {
                self.#ident = ::core::option::Option::Some(value);
                self
            }
        });
        key_checks.push(quote! {
            if self.#ident.is_some() {
                keys.push(#key);
            }
        });
        merges.push(quote! {
            if let ::core::option::Option::Some(value) = update.#ident {
                let current = ::core::mem::take(&mut next.#ident);
                next.#ident =
                    <#reducer_path as ::troupe_core::Reducer<#ty>>::reduce(&#reducer_path, current, value);
            }
        });
        specs.push(quote! {
            ::troupe_core::FieldSpec { key: #key, reducer: #reducer_kind },
        });
    }

    Ok(quote! {
        #[doc = #update_doc]
        #[derive(Clone, Debug, Default, ::serde::Serialize, ::serde::Deserialize)]
        #vis struct #update_name {
            #(#update_fields)*
        }

        impl #update_name {
            #(#setters)*

            /// Keys this update writes, in declaration order.
            pub fn written_keys(&self) -> ::std::vec::Vec<&'static str> {
                let mut keys = ::std::vec::Vec::new();
                #(#key_checks)*
                keys
            }
        }

        impl ::troupe_core::StateSchema for #name {
            type Update = #update_name;

            fn apply(current: &Self, update: Self::Update) -> Self {
                let mut next = ::core::clone::Clone::clone(current);
                #(#merges)*
                next
            }

            fn fields() -> &'static [::troupe_core::FieldSpec] {
                const FIELDS: &[::troupe_core::FieldSpec] = &[#(#specs)*];
                FIELDS
            }

            fn update_keys(update: &Self::Update) -> ::std::vec::Vec<&'static str> {
                update.written_keys()
            }
        }
    })
}
