//! Expansion of `#[function]`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{ItemFn, Path, Type, Visibility};

use crate::parse::{Annotated, FunctionArgs, Output, Param, Shape};

/// Expands `#[function]` on `item`.
///
/// The function is moved, unchanged apart from its `#[default]`
/// attributes, into a constructor of the same name that builds the
/// injectable function around it.
pub fn expand_function(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args = FunctionArgs::parse(attr)?;
    let item: ItemFn = syn::parse2(item)?;
    let annotated = Annotated::parse(item)?;

    let krate = args
        .krate
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::sanduq));
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| annotated.item.sig.ident.to_string());

    Ok(generate(&krate, &name, &annotated))
}

fn generate(krate: &Path, name: &str, annotated: &Annotated) -> TokenStream {
    let ident = &annotated.item.sig.ident;
    let vis = &annotated.item.vis;
    let docs: Vec<_> = annotated
        .item
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .collect();

    let mut body_fn = annotated.item.clone();
    body_fn.vis = Visibility::Inherited;
    body_fn.attrs.retain(|attr| !attr.path().is_ident("doc"));

    let signature = signature(krate, &annotated.params);
    let extractions = annotated.params.iter().map(|p| extraction(krate, name, p));
    let call_args = annotated.params.iter().map(call_argument);

    let call = if annotated.is_async() {
        quote! { #ident(#(#call_args),*).await }
    } else {
        quote! { #ident(#(#call_args),*) }
    };
    let output = output(krate, &annotated.output, call);

    let with_doc = annotated
        .doc
        .as_ref()
        .map(|doc| quote! { .with_doc(#doc) });

    if annotated.is_async() {
        quote! {
            #(#docs)*
            #vis fn #ident() -> #krate::AsyncFunction {
                #body_fn

                #krate::AsyncFunction::new(#name, #signature, |__bound: #krate::Bound| async move {
                    #(#extractions)*
                    #output
                })
                #with_doc
            }
        }
    } else {
        quote! {
            #(#docs)*
            #vis fn #ident() -> #krate::Function {
                #body_fn

                #krate::Function::new(#name, #signature, |__bound: #krate::Bound| {
                    #(#extractions)*
                    #output
                })
                #with_doc
            }
        }
    }
}

fn signature(krate: &Path, params: &[Param]) -> TokenStream {
    let calls = params.iter().map(|param| {
        let name = param.ident.to_string();
        let ty = &param.ty;
        match (&param.default, &param.shape) {
            (None, _) => quote! { .param(#name) },
            (Some(default), Shape::Shared(_)) => quote! {
                .param_default_value(#name, {
                    let __default: #ty = #default;
                    #krate::Value::from_arc(__default)
                })
            },
            (Some(default), Shape::Raw) => quote! {
                .param_default_value(#name, #default)
            },
            (Some(default), Shape::Borrowed(inner)) => {
                let stored = stored(inner);
                quote! {
                    .param_default(#name, {
                        let __default: #stored = #default;
                        __default
                    })
                }
            }
            (Some(default), Shape::Owned(_)) => quote! {
                .param_default(#name, {
                    let __default: #ty = #default;
                    __default
                })
            },
        }
    });
    quote! { #krate::Signature::new() #(#calls)* }
}

/// The type a borrowed parameter is stored as. `&str` reads a `String`.
fn stored(borrowed: &Type) -> Type {
    match borrowed {
        Type::Path(path) if path.qself.is_none() && path.path.is_ident("str") => {
            syn::parse_quote!(::std::string::String)
        }
        other => other.clone(),
    }
}

fn extraction(krate: &Path, function: &str, param: &Param) -> TokenStream {
    let ident = &param.ident;
    let name = ident.to_string();
    match &param.shape {
        Shape::Shared(inner) => quote! {
            let #ident = __bound.get::<#inner>(#name)?;
        },
        Shape::Borrowed(inner) => {
            let stored = stored(inner);
            let holder = holder(param);
            quote! {
                let #holder = __bound.get::<#stored>(#name)?;
            }
        }
        Shape::Raw => quote! {
            let #ident = __bound.value(#name).cloned().ok_or_else(|| {
                #krate::CallError::MissingArgument {
                    function: ::std::string::String::from(#function),
                    name: ::std::string::String::from(#name),
                }
            })?;
        },
        Shape::Owned(ty) => quote! {
            let #ident = __bound.take::<#ty>(#name)?;
        },
    }
}

fn holder(param: &Param) -> syn::Ident {
    format_ident!("__{}", param.ident)
}

fn call_argument(param: &Param) -> TokenStream {
    match &param.shape {
        Shape::Borrowed(_) => {
            let holder = holder(param);
            quote! { &#holder }
        }
        _ => {
            let ident = &param.ident;
            quote! { #ident }
        }
    }
}

fn into_value(krate: &Path, shape: &Shape, expr: TokenStream) -> TokenStream {
    match shape {
        Shape::Shared(_) => quote! { #krate::Value::from_arc(#expr) },
        Shape::Raw => expr,
        Shape::Borrowed(_) | Shape::Owned(_) => quote! { #krate::Value::new(#expr) },
    }
}

fn output(krate: &Path, output: &Output, call: TokenStream) -> TokenStream {
    let ok = quote! { ::core::result::Result::<#krate::Value, #krate::Error>::Ok };
    match output {
        Output::Unit => quote! {
            #call;
            #ok(#krate::Value::new(()))
        },
        Output::Plain(shape) => {
            let value = into_value(krate, shape, quote! { __out });
            quote! {
                let __out = #call;
                #ok(#value)
            }
        }
        Output::Fallible(shape) => {
            let value = into_value(krate, shape, quote! { __out });
            quote! {
                match #call {
                    ::core::result::Result::Ok(__out) => #ok(#value),
                    ::core::result::Result::Err(__err) => {
                        ::core::result::Result::Err(#krate::Error::failed(__err))
                    }
                }
            }
        }
    }
}
