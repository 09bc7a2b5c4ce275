use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::DeriveInput;

use crate::transform::RecordField;

pub(crate) fn emit_record(input: &DeriveInput, fields: &[RecordField]) -> TokenStream2 {
    let name = &input.ident;
    let name_str = name.to_string();

    let specs = fields.iter().map(|field| {
        let field_name = field.ident.to_string();
        let ty = &field.ty;
        let extended = field.extended;
        let seek = match field.seek {
            Some(offset) => quote! { ::core::option::Option::Some(#offset) },
            None => quote! { ::core::option::Option::None },
        };
        quote! {
            ::btrfs_subvol::decode::FieldSpec {
                name: #field_name,
                kind: <#ty as ::btrfs_subvol::decode::Field>::KIND,
                seek: #seek,
                extended: #extended,
            }
        }
    });

    let any_extended = fields.iter().any(|field| field.extended);
    let completeness = if any_extended {
        quote! {
            let __start = source.position();
            let __complete = source.covers(
                __start + <Self as ::btrfs_subvol::decode::Record>::schema().extent(),
            );
        }
    } else {
        quote! {}
    };

    let reads = fields.iter().map(|field| {
        let ident = &field.ident;
        let ty = &field.ty;
        let seek = field.seek.map(|offset| quote! { source.seek_to(#offset)?; });
        let read = quote! {
            {
                #seek
                <#ty as ::btrfs_subvol::decode::Field>::read(source)?
            }
        };
        if field.extended {
            quote! {
                let #ident: #ty = if __complete {
                    #read
                } else {
                    ::core::default::Default::default()
                };
            }
        } else {
            quote! { let #ident: #ty = #read; }
        }
    });

    let idents = fields.iter().map(|field| &field.ident);

    quote! {
        impl ::btrfs_subvol::decode::Record for #name {
            fn schema() -> &'static ::btrfs_subvol::decode::Schema {
                static SCHEMA: ::btrfs_subvol::decode::Schema = ::btrfs_subvol::decode::Schema {
                    name: #name_str,
                    fields: &[ #(#specs),* ],
                };
                &SCHEMA
            }

            fn decode<S>(source: &mut S) -> ::core::result::Result<Self, ::btrfs_subvol::decode::DecodeError>
            where
                S: ::btrfs_subvol::decode::ByteSource + ?Sized,
            {
                #completeness
                #(#reads)*
                ::core::result::Result::Ok(Self { #(#idents),* })
            }
        }

        impl ::btrfs_subvol::decode::Field for #name {
            const KIND: ::btrfs_subvol::decode::FieldKind = ::btrfs_subvol::decode::FieldKind::Record(
                <#name as ::btrfs_subvol::decode::Record>::schema,
            );

            fn read<S>(source: &mut S) -> ::core::result::Result<Self, ::btrfs_subvol::decode::DecodeError>
            where
                S: ::btrfs_subvol::decode::ByteSource + ?Sized,
            {
                <Self as ::btrfs_subvol::decode::Record>::decode(source)
            }
        }
    }
}
