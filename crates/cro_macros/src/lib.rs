//! Derive macros used by the crogine crates.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, quote_spanned, spanned::Spanned};
use venial::{Declaration, Struct, StructFields};

/// Return a `compile_error!` spanning the given item.
macro_rules! bail {
    ($item:expr, $msg:literal) => {{
        let span = $item.__span();
        return Err(quote_spanned!(span => compile_error!($msg);));
    }};
}

/// Derive [`Deref`][std::ops::Deref] for a struct with one field.
///
/// Structs with several named fields dereference to the one marked `#[deref]`.
#[proc_macro_derive(Deref, attributes(deref))]
pub fn derive_deref(input: TokenStream) -> TokenStream {
    expand(input, |name, params, field, ty| {
        quote! {
            impl #params ::std::ops::Deref for #name #params {
                type Target = #ty;

                fn deref(&self) -> &Self::Target {
                    &self.#field
                }
            }
        }
    })
}

/// Derive [`DerefMut`][std::ops::DerefMut] for a struct that derives [`Deref`].
#[proc_macro_derive(DerefMut, attributes(deref))]
pub fn derive_deref_mut(input: TokenStream) -> TokenStream {
    expand(input, |name, params, field, _ty| {
        quote! {
            impl #params ::std::ops::DerefMut for #name #params {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.#field
                }
            }
        }
    })
}

type Emit = fn(&TokenStream2, &TokenStream2, &TokenStream2, &TokenStream2) -> TokenStream2;

fn expand(input: TokenStream, emit: Emit) -> TokenStream {
    let declaration = match venial::parse_declaration(input.into()) {
        Ok(declaration) => declaration,
        Err(e) => return e.to_compile_error().into(),
    };
    match deref_impl(&declaration, emit) {
        Ok(tokens) | Err(tokens) => tokens.into(),
    }
}

fn deref_impl(declaration: &Declaration, emit: Emit) -> Result<TokenStream2, TokenStream2> {
    let Some(s) = declaration.as_struct() else {
        bail!(declaration, "Deref can only be derived for structs");
    };
    let (field, ty) = deref_target(s)?;
    let name = &s.name;
    let params = &s.generic_params;
    Ok(emit(&quote!(#name), &quote!(#params), &field, &ty))
}

/// The field to dereference to and its type: the only field, or the one marked `#[deref]`.
fn deref_target(s: &Struct) -> Result<(TokenStream2, TokenStream2), TokenStream2> {
    match &s.fields {
        StructFields::Tuple(tuple) if tuple.fields.len() == 1 => {
            let ty = &tuple.fields[0].0.ty;
            Ok((quote!(0), quote!(#ty)))
        }
        StructFields::Tuple(tuple) => bail!(tuple, "Tuple structs must have exactly one field"),
        StructFields::Named(named) => {
            let deref = format_ident!("deref");
            let mut marked = named.fields.iter().map(|(field, _)| field).filter(|field| {
                field.attributes.iter().any(|attr| {
                    attr.get_single_path_segment() == Some(&deref)
                        && attr.get_value_tokens().is_empty()
                })
            });
            let field = match (named.fields.len(), marked.next(), marked.next()) {
                (1, _, _) => &named.fields[0].0,
                (_, Some(field), None) => field,
                (_, Some(_), Some(_)) => bail!(named, "Only one field may be marked #[deref]"),
                _ => bail!(named, "Mark the field to dereference to with #[deref]"),
            };
            let (name, ty) = (&field.name, &field.ty);
            Ok((quote!(#name), quote!(#ty)))
        }
        StructFields::Unit => bail!(s, "Unit structs have no field to dereference to"),
    }
}
