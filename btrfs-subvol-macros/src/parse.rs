use syn::{Attribute, LitInt, Result as SynResult};

#[derive(Default)]
pub(crate) struct FieldArgs {
    pub(crate) seek: Option<usize>,
    pub(crate) extended: bool,
}

impl FieldArgs {
    pub(crate) fn from_attrs(attrs: &[Attribute]) -> SynResult<Self> {
        let mut args = FieldArgs::default();

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("record")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("seek") {
                    let lit: LitInt = meta.value()?.parse()?;
                    args.seek = Some(lit.base10_parse::<usize>()?);
                    Ok(())
                } else if meta.path.is_ident("extended") {
                    args.extended = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `seek = <offset>` or `extended`"))
                }
            })?;
        }

        Ok(args)
    }
}
