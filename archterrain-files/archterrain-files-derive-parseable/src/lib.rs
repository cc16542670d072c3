extern crate proc_macro2;

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{Data, DeriveInput, Fields, FieldsNamed, Ident, parse_macro_input, spanned::Spanned};

/// Derives `Parseable` for a struct of little-endian fields, read in declaration order.
#[proc_macro_derive(Parse)]
pub fn derive_parseable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    derive_parse_internal(input).into()
}

/// Derives `Writeable`, the exact inverse of `#[derive(Parse)]`.
#[proc_macro_derive(Writeable)]
pub fn derive_writeable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    derive_writeable_internal(input).into()
}

fn files_crate() -> TokenStream {
    match crate_name("archterrain-files") {
        Ok(FoundCrate::Itself) | Err(_) => quote!(crate),
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(#ident)
        }
    }
}

fn named_fields<'a>(data: &'a Data, ident: &Ident, derive: &str) -> &'a FieldsNamed {
    match data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => fields,
            _ => panic!(
                "#[derive({})]` only supports named struct fields at the moment: {}",
                derive, ident
            ),
        },
        _ => panic!("`#[derive({})]` is only available on structs: {}", derive, ident),
    }
}

// taken from sharnoff/derive-syn-parse: put it into a separate function for testability
pub(crate) fn derive_parse_internal(input: DeriveInput) -> TokenStream {
    let crate_name = files_crate();
    let ident = input.ident;
    let fields = named_fields(&input.data, &ident, "Parse");

    let recurse = fields.named.iter().map(|f| {
        let name = &f.ident;
        let ftype = &f.ty;
        quote_spanned! {f.span()=>
            #name: <#ftype as #crate_name::common::reader::Parseable<#ftype>>::parse(rdr)?,
        }
    });

    quote!(
        impl #crate_name::common::reader::Parseable<#ident> for #ident {
            fn parse<R: ::std::io::Read>(rdr: &mut R) -> Result<#ident, #crate_name::ParserError> {
                Ok(#ident{
                    #(#recurse)*
                })
            }
        }
    )
}

pub(crate) fn derive_writeable_internal(input: DeriveInput) -> TokenStream {
    let crate_name = files_crate();
    let ident = input.ident;
    let fields = named_fields(&input.data, &ident, "Writeable");

    let recurse = fields.named.iter().map(|f| {
        let name = &f.ident;
        quote_spanned! {f.span()=>
            #crate_name::common::writer::Writeable::write(&self.#name, wtr)?;
        }
    });

    quote!(
        impl #crate_name::common::writer::Writeable for #ident {
            fn write<W: ::std::io::Write>(&self, wtr: &mut W) -> Result<(), #crate_name::ParserError> {
                #(#recurse)*
                Ok(())
            }
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(tokens: TokenStream) -> String {
        tokens.to_string().chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    pub fn parse_reads_fields_in_order() {
        let input: DeriveInput = syn::parse_quote! {
            struct LineBlock {
                start: C3Vector,
                serial: u32,
            }
        };

        let tokens = squash(derive_parse_internal(input));
        let start = tokens.find("start:").unwrap();
        let serial = tokens.find("serial:").unwrap();
        assert!(start < serial);
        assert!(tokens.contains("Parseable<LineBlock>forLineBlock"));
    }

    #[test]
    pub fn writeable_emits_every_field() {
        let input: DeriveInput = syn::parse_quote! {
            struct ChunkHeader {
                id: u32,
                size: u32,
                version: u32,
            }
        };

        let tokens = squash(derive_writeable_internal(input));
        assert!(tokens.contains("Writeable::write(&self.id,wtr)?;"));
        assert!(tokens.contains("Writeable::write(&self.version,wtr)?;"));
    }
}
