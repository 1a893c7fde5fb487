use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Attribute, Expr, GenericArgument, Ident, PathArguments, Token, Type, Visibility,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
    token,
};

struct ConfigField {
    attrs: Vec<Attribute>,
    name: Ident,
    ty: Type,
    default_value: Expr,
    partial_ty: Option<Type>,
}

impl Parse for ConfigField {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        // doc comments on fields are forwarded to the generated struct
        let attrs = input.call(Attribute::parse_outer)?;
        let name: Ident = input.parse()?;
        input.parse::<Token![:]>()?;
        let ty: Type = input.parse()?;

        // `name: Type = default` or, for nested configs,
        // `name: Type (PartialType = default)`
        let (partial_ty, default_value) = if input.peek(token::Paren) {
            let content;
            syn::parenthesized!(content in input);
            let partial_ty: Type = content.parse()?;
            content.parse::<Token![=]>()?;
            (Some(partial_ty), content.parse()?)
        } else {
            input.parse::<Token![=]>()?;
            (None, input.parse()?)
        };

        Ok(ConfigField {
            attrs,
            name,
            ty,
            default_value,
            partial_ty,
        })
    }
}

struct ConfigInput {
    attrs: Vec<Attribute>,
    vis: Visibility,
    name: Ident,
    fields: Punctuated<ConfigField, Token![,]>,
}

impl Parse for ConfigInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        input.parse::<Token![struct]>()?;
        let name: Ident = input.parse()?;
        let content;
        syn::braced!(content in input);
        let fields = content.parse_terminated(ConfigField::parse, Token![,])?;
        Ok(ConfigInput {
            attrs,
            vis,
            name,
            fields,
        })
    }
}

impl ConfigField {
    /// Type of the field in the partial struct. Already optional types are
    /// not wrapped a second time, nested configs use their own partial type.
    fn partial_type(&self) -> proc_macro2::TokenStream {
        let ty = &self.ty;
        match &self.partial_ty {
            Some(partial_ty) => quote! { #partial_ty },
            None if is_option(ty) => quote! { #ty },
            None => quote! { Option<#ty> },
        }
    }

    fn declaration(&self) -> proc_macro2::TokenStream {
        let ConfigField { attrs, name, ty, .. } = self;
        quote! {
            #( #attrs )*
            #name: #ty
        }
    }

    fn partial_declaration(&self) -> proc_macro2::TokenStream {
        let name = &self.name;
        let partial_ty = self.partial_type();
        quote! {
            #[serde(default)]
            #name: #partial_ty
        }
    }

    fn default_init(&self) -> proc_macro2::TokenStream {
        let ConfigField {
            name, default_value, ..
        } = self;
        quote! { #name: #default_value }
    }

    fn partial_init(&self) -> proc_macro2::TokenStream {
        let ConfigField {
            name, default_value, ..
        } = self;
        quote! { #name: partial.#name.into_or(#default_value) }
    }

    /// `with_<name>`, `set_<name>` and `get_<name>`.
    fn accessors(&self) -> proc_macro2::TokenStream {
        let ConfigField { name, ty, .. } = self;
        let with_name = format_ident!("with_{}", name);
        let set_name = format_ident!("set_{}", name);
        let get_name = format_ident!("get_{}", name);
        quote! {
            pub fn #with_name(mut self, #name: #ty) -> Self {
                self.#name = #name;
                self
            }

            pub fn #set_name(&mut self, #name: #ty) {
                self.#name = #name;
            }

            pub fn #get_name(&self) -> &#ty {
                &self.#name
            }
        }
    }
}

fn is_option(ty: &Type) -> bool {
    let Type::Path(type_path) = ty else {
        return false;
    };
    let Some(last) = type_path.path.segments.last() else {
        return false;
    };
    if last.ident != "Option" {
        return false;
    }

    match &last.arguments {
        PathArguments::AngleBracketed(args) => {
            args.args.len() == 1 && matches!(args.args[0], GenericArgument::Type(_))
        }
        _ => false,
    }
}

/// Generates a configuration struct together with a `Partial` variant in
/// which every field is optional. Missing fields of a loaded file fall back
/// to the declared defaults. Files ending in `.json` are read as JSON, every
/// other file as TOML. Unknown keys are rejected.
///
/// ```ignore
/// config! {
///     pub struct FilterConfig {
///         /// Number of filter rounds before falling back to random formulas.
///         max_rounds: usize = 3,
///         tmp_dir: Option<String> = None,
///     }
/// }
/// ```
#[proc_macro]
pub fn config(input: TokenStream) -> TokenStream {
    let ConfigInput {
        attrs,
        vis,
        name,
        fields,
    } = parse_macro_input!(input as ConfigInput);
    let partial_name = format_ident!("Partial{}", name);

    let declarations = fields.iter().map(ConfigField::declaration);
    let partial_declarations = fields.iter().map(ConfigField::partial_declaration);
    let default_inits = fields.iter().map(ConfigField::default_init);
    let partial_inits = fields.iter().map(ConfigField::partial_init);
    let accessors = fields.iter().map(ConfigField::accessors);

    let expanded = quote! {
        #( #attrs )*
        #[derive(Debug, Clone, serde::Serialize)]
        #vis struct #name {
            #( #declarations, )*
        }

        #[derive(Debug, Clone, Default, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        #vis struct #partial_name {
            #( #partial_declarations, )*
        }

        impl Default for #name {
            fn default() -> Self {
                #name {
                    #( #default_inits, )*
                }
            }
        }

        impl #name {
            /// Fills every field missing from `partial` with its default.
            pub fn from_partial(partial: #partial_name) -> Self {
                use crate::config::IntoOr;
                #name {
                    #( #partial_inits, )*
                }
            }

            /// Parses `content` as JSON if `extension` is `json`, as TOML
            /// otherwise.
            pub fn from_str_with_extension(content: &str, extension: Option<&str>) -> anyhow::Result<Self> {
                let is_json = extension.is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                let partial: #partial_name = if is_json {
                    serde_json::from_str(content)?
                } else {
                    toml::from_str(content)?
                };
                Ok(Self::from_partial(partial))
            }

            pub fn from_file<P: AsRef<std::path::Path>>(file_path: P) -> anyhow::Result<Self> {
                use anyhow::Context;
                let file_path = file_path.as_ref();
                let content = std::fs::read_to_string(file_path)
                    .with_context(|| format!("failed to read config: {}", file_path.display()))?;
                let extension = file_path.extension().and_then(|e| e.to_str());
                Self::from_str_with_extension(&content, extension)
                    .with_context(|| format!("failed to parse config: {}", file_path.display()))
            }

            /// The defaults when no file is given.
            pub fn from_optional_file<P: AsRef<std::path::Path>>(file_path: Option<P>) -> anyhow::Result<Self> {
                file_path.map_or_else(|| Ok(Self::default()), Self::from_file)
            }

            #( #accessors )*
        }

        // a missing nested section falls back to the declared default
        impl crate::config::IntoOr<#name> for Option<#partial_name> {
            fn into_or(self, or: #name) -> #name {
                self.map_or(or, #name::from_partial)
            }
        }
    };

    TokenStream::from(expanded)
}
