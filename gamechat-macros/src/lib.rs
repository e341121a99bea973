//! Proc macros for gamechat tool definitions.
//!
//! Provides `#[derive(Tool)]`, which turns an argument struct into a tool
//! definition the LLM can call and a validator that checks raw JSON
//! arguments against the same schema before anything is dispatched.
//!
//! # Example
//!
//! ```ignore
//! /// Look up a video game by title
//! #[derive(Tool, Deserialize)]
//! #[tool(name = "lookup_game")]
//! struct LookupGame {
//!     /// Title of the game
//!     #[tool(non_empty)]
//!     game_name: String,
//!     /// Platform to focus on
//!     platform: Option<String>,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Field, Lit, Meta, Type};

/// Derive macro for generating tool definitions and argument validation.
///
/// # Attributes
///
/// - `#[tool(name = "...")]` - Override the tool name (defaults to snake_case struct name)
/// - `#[tool(optional)]` on fields - Mark field as optional in JSON schema
/// - `#[tool(non_empty)]` on string fields - Reject blank values during validation
/// - `#[tool(rename = "...")]` on fields - Override field name in schema
///   (pair it with a matching `#[serde(rename)]`)
///
/// The struct must also implement `serde::Deserialize`; the generated
/// `validate_arguments` deserializes into it once the schema checks pass.
#[proc_macro_derive(Tool, attributes(tool))]
pub fn derive_tool(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_tool(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand_tool(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let tool_name = get_tool_name(&input)?;
    let description = get_doc_comment(&input.attrs);

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Tool derive only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Tool derive only supports structs")),
    };

    let mut property_tokens = Vec::new();
    let mut check_tokens = Vec::new();
    let mut required_fields = Vec::new();

    for field in fields {
        let field_name_str = get_field_name(field)?;
        let field_desc = get_doc_comment(&field.attrs);
        let field_type = &field.ty;
        let required = !has_flag(field, "optional") && !is_option_type(field_type);
        let non_empty = has_flag(field, "non_empty");

        let type_schema = type_to_schema(field_type)?;
        let json_type = json_type_name(field_type);

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                properties.insert(#field_name_str.to_string(), property);
            }
        });

        let type_check = match json_type {
            "string" => quote! { value.is_string() },
            "integer" => quote! { value.is_i64() || value.is_u64() },
            "number" => quote! { value.is_number() },
            "boolean" => quote! { value.is_boolean() },
            "array" => quote! { value.is_array() },
            "object" => quote! { value.is_object() },
            _ => quote! { { let _ = value; true } },
        };

        let missing = if required {
            quote! {
                return Err(format!("missing required parameter '{}'", #field_name_str));
            }
        } else {
            quote! {}
        };

        let blank = if non_empty {
            quote! {
                if value.as_str().is_some_and(|s| s.trim().is_empty()) {
                    return Err(format!("parameter '{}' must not be empty", #field_name_str));
                }
            }
        } else {
            quote! {}
        };

        check_tokens.push(quote! {
            match object.get(#field_name_str) {
                None | Some(serde_json::Value::Null) => { #missing }
                Some(value) => {
                    if !(#type_check) {
                        return Err(format!(
                            "parameter '{}' must be of type {}",
                            #field_name_str, #json_type
                        ));
                    }
                    #blank
                }
            }
        });

        if required {
            required_fields.push(field_name_str);
        }
    }

    let required_array: Vec<_> = required_fields.iter().map(|s| quote! { #s }).collect();

    Ok(quote! {
        impl #struct_name {
            /// Get the tool name.
            pub fn tool_name() -> &'static str {
                #tool_name
            }

            /// Get the tool description.
            pub fn tool_description() -> &'static str {
                #description
            }

            /// Generate the JSON schema for this tool's input.
            pub fn input_schema() -> serde_json::Value {
                let mut properties = serde_json::Map::new();
                #(#property_tokens)*

                let required: Vec<&str> = vec![#(#required_array),*];

                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }

            /// Create a Tool definition for use with the Claude API.
            pub fn as_tool() -> claude::Tool {
                claude::Tool {
                    name: Self::tool_name().to_string(),
                    description: Self::tool_description().to_string(),
                    input_schema: Self::input_schema(),
                }
            }

            /// Check raw arguments against the input schema and decode them.
            ///
            /// Returns a human-readable reason on failure.
            pub fn validate_arguments(arguments: &serde_json::Value) -> Result<Self, String> {
                let Some(object) = arguments.as_object() else {
                    return Err("arguments must be a JSON object".to_string());
                };

                #(#check_tokens)*

                serde_json::from_value(arguments.clone()).map_err(|e| e.to_string())
            }
        }
    })
}

fn get_tool_name(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if attr.path().is_ident("tool") {
            let meta = attr.parse_args::<Meta>()?;
            if let Meta::NameValue(nv) = meta {
                if nv.path.is_ident("name") {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            return Ok(s.value());
                        }
                    }
                }
            }
        }
    }

    Ok(to_snake_case(&input.ident.to_string()))
}

fn get_field_name(field: &Field) -> syn::Result<String> {
    for attr in &field.attrs {
        if attr.path().is_ident("tool") {
            if let Ok(Meta::NameValue(nv)) = attr.parse_args::<Meta>() {
                if nv.path.is_ident("rename") {
                    if let syn::Expr::Lit(expr_lit) = &nv.value {
                        if let Lit::Str(s) = &expr_lit.lit {
                            return Ok(s.value());
                        }
                    }
                }
            }
        }
    }

    field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .ok_or_else(|| syn::Error::new_spanned(field, "Tool fields must be named"))
}

fn has_flag(field: &Field, flag: &str) -> bool {
    field.attrs.iter().any(|attr| {
        attr.path().is_ident("tool")
            && matches!(attr.parse_args::<Meta>(), Ok(Meta::Path(path)) if path.is_ident(flag))
    })
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == "Option")
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(syn::GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

/// JSON Schema `type` keyword for a Rust field type ("any" when unknown).
fn json_type_name(ty: &Type) -> &'static str {
    let Some(segment) = last_segment(ty) else {
        return "any";
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => "string",
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            "integer"
        }
        "f32" | "f64" => "number",
        "bool" => "boolean",
        "Vec" => "array",
        "Option" => first_generic(segment).map(json_type_name).unwrap_or("any"),
        _ => "object",
    }
}

fn type_to_schema(ty: &Type) -> syn::Result<TokenStream2> {
    let Some(segment) = last_segment(ty) else {
        return Ok(quote! { serde_json::json!({}) });
    };

    Ok(match segment.ident.to_string().as_str() {
        "Option" => match first_generic(segment) {
            Some(inner) => return type_to_schema(inner),
            None => quote! { serde_json::json!({}) },
        },
        "Vec" => match first_generic(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner)?;
                quote! {
                    serde_json::json!({
                        "type": "array",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { serde_json::json!({"type": "array"}) },
        },
        _ => {
            let json_type = json_type_name(ty);
            quote! { serde_json::json!({"type": #json_type}) }
        }
    })
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
