//! `#[transactional]` attribute implementation

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ImplItem, ImplItemFn, ItemImpl, Pat, PatIdent, Result};

/// Method names never wrapped, even when otherwise eligible.
const EXCLUDED: &[&str] = &[
    "new",
    "database",
    "transaction",
    "with_transaction",
    "client",
    "connection",
];

pub fn expand(attr: TokenStream, mut item: ItemImpl) -> Result<TokenStream> {
    if !attr.is_empty() {
        return Err(syn::Error::new_spanned(
            attr,
            "#[transactional] takes no arguments",
        ));
    }
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[transactional] must be applied to an inherent impl block",
        ));
    }

    let mut generated = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        if !is_eligible(method) {
            continue;
        }
        let inner = rename_inner(method);
        generated.push(wrapper(method, &inner)?);
        *method = inner;
    }
    item.items.extend(generated.into_iter().map(ImplItem::Fn));

    Ok(quote!(#item))
}

fn is_eligible(method: &ImplItemFn) -> bool {
    let name = method.sig.ident.to_string();
    method.sig.asyncness.is_some()
        && !name.starts_with('_')
        && !EXCLUDED.contains(&name.as_str())
        && matches!(
            method.sig.inputs.first(),
            Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none()
        )
}

/// Attributes copied onto the inner method as well as the wrapper.
const SHARED_ATTRS: &[&str] = &["cfg", "allow", "expect", "warn", "deny", "forbid"];

/// The original method, moved to a hidden private name.
///
/// Other attributes (docs, `#[tracing::instrument]`, `#[must_use]`, ...) stay
/// on the wrapper only, so they apply once per call.
fn rename_inner(method: &ImplItemFn) -> ImplItemFn {
    let mut inner = method.clone();
    inner.sig.ident = format_ident!("__tx_{}", method.sig.ident);
    inner.vis = syn::Visibility::Inherited;
    inner
        .attrs
        .retain(|a| SHARED_ATTRS.iter().any(|name| a.path().is_ident(name)));
    inner.attrs.push(syn::parse_quote!(#[doc(hidden)]));
    inner
}

/// A method with the original signature that runs the inner one in an
/// ambient transaction.
fn wrapper(method: &ImplItemFn, inner: &ImplItemFn) -> Result<ImplItemFn> {
    let mut sig = method.sig.clone();
    let mut args = Vec::new();

    for input in sig.inputs.iter_mut().skip(1) {
        let FnArg::Typed(typed) = input else {
            continue;
        };
        match typed.pat.as_mut() {
            Pat::Ident(PatIdent {
                ident,
                by_ref: None,
                subpat: None,
                mutability,
                ..
            }) => {
                *mutability = None;
                args.push(ident.clone());
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "#[transactional] methods must bind arguments to plain identifiers",
                ));
            }
        }
    }

    let attrs = &method.attrs;
    let vis = &method.vis;
    let inner_name = &inner.sig.ident;
    let db = quote!(::pgmapper::Transactional::database(self));
    let body = quote! {
        #db.transaction(move || self.#inner_name(#(#args),*)).await
    };

    let block: syn::Block = syn::parse2(quote!({ #body }))?;
    Ok(ImplItemFn {
        attrs: attrs.clone(),
        vis: vis.clone(),
        defaultness: None,
        sig,
        block,
    })
}
