use syn::{Data, DeriveInput, Error, Fields, Ident, Result as SynResult, Type};

use crate::parse::FieldArgs;

pub(crate) struct RecordField {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    pub(crate) seek: Option<usize>,
    pub(crate) extended: bool,
}

pub(crate) fn collect_fields(input: &DeriveInput) -> SynResult<Vec<RecordField>> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "#[derive(Record)] does not support generic records",
        ));
    }

    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(
            &input.ident,
            "#[derive(Record)] only supports structs",
        ));
    };

    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(
            &input.ident,
            "#[derive(Record)] requires named fields",
        ));
    };

    let mut fields = Vec::with_capacity(named.named.len());
    let mut seen_extended = false;

    for field in &named.named {
        let args = FieldArgs::from_attrs(&field.attrs)?;
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new_spanned(field, "unnamed field in named struct"))?;

        // Extended fields form the tail of a record; a plain field after them
        // would be read from a region that may not exist.
        if seen_extended && !args.extended {
            return Err(Error::new_spanned(
                field,
                "non-extended field follows an extended field",
            ));
        }
        seen_extended |= args.extended;

        fields.push(RecordField {
            ident,
            ty: field.ty.clone(),
            seek: args.seek,
            extended: args.extended,
        });
    }

    Ok(fields)
}
