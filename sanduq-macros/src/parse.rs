//! Parsing for the `#[function]` attribute and the annotated item.

use darling::FromMeta;
use darling::ast::NestedMeta;
use proc_macro2::TokenStream;
use syn::{
    Attribute, Expr, FnArg, GenericArgument, Ident, ItemFn, Pat, PatType, Path, PathArguments,
    ReturnType, Type, spanned::Spanned,
};

/// Arguments of `#[function(...)]`.
#[derive(Debug, Default, FromMeta)]
pub struct FunctionArgs {
    /// Name reported in call errors.
    #[darling(default)]
    pub name: Option<String>,
    /// Path to the `sanduq` crate.
    #[darling(default, rename = "crate")]
    pub krate: Option<Path>,
}

impl FunctionArgs {
    pub fn parse(attr: TokenStream) -> syn::Result<Self> {
        if attr.is_empty() {
            return Ok(Self::default());
        }
        let items = NestedMeta::parse_meta_list(attr)?;
        Self::from_list(&items).map_err(syn::Error::from)
    }
}

/// How a type is carried in and out of a [`Value`](../sanduq/struct.Value.html).
#[derive(Debug, Clone)]
pub enum Shape {
    /// `Arc<T>`, holding `T`.
    Shared(Type),
    /// `&T`.
    Borrowed(Type),
    /// `Value` itself.
    Raw,
    /// Any other `T`, cloned out.
    Owned(Type),
}

impl Shape {
    pub fn of(ty: &Type) -> syn::Result<Self> {
        match ty {
            Type::Reference(reference) => {
                if reference.mutability.is_some() {
                    return Err(syn::Error::new(
                        ty.span(),
                        "injected values are shared, use `&T` or `Arc<T>` instead of `&mut T`",
                    ));
                }
                Ok(Shape::Borrowed((*reference.elem).clone()))
            }
            Type::ImplTrait(_) => Err(syn::Error::new(
                ty.span(),
                "`impl Trait` parameters are not supported, name a concrete type",
            )),
            Type::Path(path) if path.qself.is_none() => {
                let Some(last) = path.path.segments.last() else {
                    return Ok(Shape::Owned(ty.clone()));
                };
                if last.ident == "Arc" {
                    if let Some(inner) = single_type_argument(&last.arguments) {
                        return Ok(Shape::Shared(inner.clone()));
                    }
                }
                if last.ident == "Value" && last.arguments.is_none() {
                    return Ok(Shape::Raw);
                }
                Ok(Shape::Owned(ty.clone()))
            }
            _ => Ok(Shape::Owned(ty.clone())),
        }
    }
}

fn single_type_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(ty)) => Some(ty),
        _ => None,
    }
}

/// A parameter of the annotated function.
#[derive(Debug)]
pub struct Param {
    pub ident: Ident,
    pub ty: Type,
    pub shape: Shape,
    pub default: Option<Expr>,
}

impl Param {
    fn from_fn_arg(arg: &mut FnArg) -> syn::Result<Self> {
        match arg {
            FnArg::Typed(PatType { attrs, pat, ty, .. }) => {
                let ident = match &**pat {
                    Pat::Ident(pat_ident) if pat_ident.subpat.is_none() => pat_ident.ident.clone(),
                    other => {
                        return Err(syn::Error::new(
                            other.span(),
                            "injectable function parameters must be plain identifiers",
                        ));
                    }
                };
                let default = take_default(attrs)?;
                Ok(Self {
                    ident,
                    shape: Shape::of(ty)?,
                    ty: (**ty).clone(),
                    default,
                })
            }
            FnArg::Receiver(receiver) => Err(syn::Error::new(
                receiver.span(),
                "injectable functions cannot have a self parameter",
            )),
        }
    }
}

/// Removes `#[default(expr)]` from `attrs`, returning `expr`.
fn take_default(attrs: &mut Vec<Attribute>) -> syn::Result<Option<Expr>> {
    let mut default = None;
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if !attr.path().is_ident("default") {
            kept.push(attr);
            continue;
        }
        if default.is_some() {
            return Err(syn::Error::new(attr.span(), "duplicate `#[default]`"));
        }
        default = Some(attr.parse_args::<Expr>()?);
    }
    *attrs = kept;
    Ok(default)
}

/// What the annotated function returns.
#[derive(Debug)]
pub enum Output {
    Unit,
    Plain(Shape),
    Fallible(Shape),
}

impl Output {
    fn of(output: &ReturnType) -> syn::Result<Self> {
        let ReturnType::Type(_, ty) = output else {
            return Ok(Output::Unit);
        };
        if let Type::Tuple(tuple) = &**ty {
            if tuple.elems.is_empty() {
                return Ok(Output::Unit);
            }
        }
        if let Type::Path(path) = &**ty {
            if let Some(last) = path.path.segments.last() {
                if last.ident == "Result" {
                    let ok = single_type_argument(&last.arguments).ok_or_else(|| {
                        syn::Error::new(ty.span(), "expected `Result<T, E>`")
                    })?;
                    return Ok(Output::Fallible(returned(ok)?));
                }
            }
        }
        Ok(Output::Plain(returned(ty)?))
    }
}

fn returned(ty: &Type) -> syn::Result<Shape> {
    match Shape::of(ty)? {
        Shape::Borrowed(_) => Err(syn::Error::new(
            ty.span(),
            "injectable functions cannot return references",
        )),
        shape => Ok(shape),
    }
}

/// The annotated function, with `#[default]` attributes stripped.
#[derive(Debug)]
pub struct Annotated {
    pub item: ItemFn,
    pub params: Vec<Param>,
    pub output: Output,
    pub doc: Option<String>,
}

impl Annotated {
    pub fn parse(mut item: ItemFn) -> syn::Result<Self> {
        let generics = &item.sig.generics;
        if !generics.params.is_empty() || generics.where_clause.is_some() {
            return Err(syn::Error::new(
                generics.span(),
                "injectable functions cannot be generic",
            ));
        }
        if let Some(variadic) = &item.sig.variadic {
            return Err(syn::Error::new(variadic.span(), "variadic functions are not supported"));
        }

        let params = item
            .sig
            .inputs
            .iter_mut()
            .map(Param::from_fn_arg)
            .collect::<syn::Result<Vec<_>>>()?;
        let output = Output::of(&item.sig.output)?;
        let doc = doc_string(&item.attrs);

        Ok(Self {
            item,
            params,
            output,
            doc,
        })
    }

    pub fn is_async(&self) -> bool {
        self.item.sig.asyncness.is_some()
    }
}

/// Joins the `///` lines of `attrs`.
fn doc_string(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(line.as_str()).to_string())
        .collect();

    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}
