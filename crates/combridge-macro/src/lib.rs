//! Procedural macros for the combridge vtable bridge.
//!
//! Provides `#[com_interface("guid")]` — declare a bridged interface from a
//! trait definition. One declaration generates both dispatch directions:
//!
//! - `{Name}Vtable` — `#[repr(C)]` slot table embedding the base vtable as
//!   its first field, so the flattened layout is base-first automatically.
//! - `{Name}` — the native-backed proxy wrapper; each method loads the
//!   stored object pointer, selects the typed slot and calls out with the
//!   `extern "system"` convention.
//! - `{Name}Impl` — the trait a managed implementation provides.
//! - `{Name}Vtable::new::<D, T>()` — the thunk table for exposing a `T` to
//!   native code; each thunk recovers the implementation from the opaque
//!   handle stored beside the vtable pointer and forwards into `T`.
//!
//! Options:
//! - `#[com_interface("xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx")]` — identity.
//! - `extends(IBase)` — single base interface; defaults to the implicit
//!   `IUnknown` root.
//! - Omitting the guid declares an identity-less interface (nil UUID);
//!   such interfaces cannot be the target of `cast`/`try_cast`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{FnArg, Ident, ItemTrait, Pat, TraitItem, Type, parse_macro_input, spanned::Spanned};

// =============================================================================
// Configuration
// =============================================================================

/// Parsed `#[com_interface(..)]` options.
struct InterfaceConfig {
    /// Interface identity; `None` declares the nil identity.
    guid: Option<(u32, u16, u16, [u8; 8])>,
    /// Base interface; `None` means the implicit `IUnknown` root.
    base: Option<Ident>,
}

fn parse_config(attr: TokenStream) -> Result<InterfaceConfig, syn::Error> {
    let mut config = InterfaceConfig {
        guid: None,
        base: None,
    };

    let attr2: TokenStream2 = attr.into();
    let tokens: Vec<_> = attr2.into_iter().collect();

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            proc_macro2::TokenTree::Literal(lit) => {
                let lit: syn::Lit = syn::parse2(quote! { #lit })?;
                let syn::Lit::Str(guid_str) = lit else {
                    return Err(syn::Error::new(
                        tokens[i].span(),
                        "expected a string literal guid",
                    ));
                };
                let parsed = parse_guid_string(&guid_str.value())
                    .map_err(|msg| syn::Error::new(guid_str.span(), msg))?;
                config.guid = Some(parsed);
                i += 1;
            }
            proc_macro2::TokenTree::Ident(ident) if ident == "extends" => {
                i += 1;
                let Some(proc_macro2::TokenTree::Group(group)) = tokens.get(i) else {
                    return Err(syn::Error::new(
                        ident.span(),
                        "expected '(...)' after 'extends'",
                    ));
                };
                let base: Ident = syn::parse2(group.stream()).map_err(|_| {
                    syn::Error::new(group.span(), "expected an identifier inside 'extends(...)'")
                })?;
                config.base = Some(base);
                i += 1;
            }
            proc_macro2::TokenTree::Punct(punct) if punct.as_char() == ',' => {
                i += 1;
            }
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "unknown option, expected a guid string or 'extends(...)'",
                ));
            }
        }
    }

    Ok(config)
}

/// Parse a GUID string in format "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx".
fn parse_guid_string(s: &str) -> Result<(u32, u16, u16, [u8; 8]), String> {
    let s = s.trim();
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 5
        || parts[0].len() != 8
        || parts[1].len() != 4
        || parts[2].len() != 4
        || parts[3].len() != 4
        || parts[4].len() != 12
    {
        return Err(format!(
            "invalid guid: expected 'xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx', got '{s}'"
        ));
    }

    let data1 = u32::from_str_radix(parts[0], 16)
        .map_err(|_| format!("invalid guid field '{}'", parts[0]))?;
    let data2 = u16::from_str_radix(parts[1], 16)
        .map_err(|_| format!("invalid guid field '{}'", parts[1]))?;
    let data3 = u16::from_str_radix(parts[2], 16)
        .map_err(|_| format!("invalid guid field '{}'", parts[2]))?;

    let tail = format!("{}{}", parts[3], parts[4]);
    let mut data4 = [0u8; 8];
    for (i, byte) in data4.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&tail[i * 2..i * 2 + 2], 16)
            .map_err(|_| format!("invalid guid byte '{}'", &tail[i * 2..i * 2 + 2]))?;
    }

    Ok((data1, data2, data3, data4))
}

// =============================================================================
// Validation: methods must be expressible as native vtable slots
// =============================================================================

/// Reject types that cannot cross the boundary. Only fixed-layout values
/// and raw pointers are allowed; managed containers are not.
fn check_boundary_type(ty: &Type) -> Result<(), String> {
    match ty {
        Type::Path(type_path) => {
            if let Some(segment) = type_path.path.segments.last() {
                match segment.ident.to_string().as_str() {
                    "String" | "str" => {
                        return Err("strings cannot cross the boundary; use *const c_char".into());
                    }
                    "Vec" => {
                        return Err(
                            "Vec<T> cannot cross the boundary; use *const T plus a length".into(),
                        );
                    }
                    "Box" | "Rc" | "Arc" => {
                        return Err(format!(
                            "{} cannot cross the boundary; use a raw pointer",
                            segment.ident
                        ));
                    }
                    "Result" => {
                        return Err(
                            "Result cannot cross the boundary; return an HResult status".into()
                        );
                    }
                    _ => {}
                }
            }
        }
        Type::Reference(_) => {
            return Err("references cannot cross the boundary; use *const T or *mut T".into());
        }
        Type::Slice(_) => {
            return Err("slices cannot cross the boundary; use *const T plus a length".into());
        }
        Type::TraitObject(_) => {
            return Err("trait objects cannot cross the boundary".into());
        }
        Type::ImplTrait(_) => {
            return Err("impl Trait cannot cross the boundary".into());
        }
        Type::Tuple(tuple) if !tuple.elems.is_empty() => {
            return Err("tuples cannot cross the boundary; use a #[repr(C)] struct".into());
        }
        _ => {}
    }
    Ok(())
}

fn validate_method(method: &syn::TraitItemFn) -> Result<(), syn::Error> {
    let name = &method.sig.ident;
    let span = name.span();

    if method.sig.asyncness.is_some() {
        return Err(syn::Error::new(
            span,
            format!("method '{name}': async methods cannot cross the boundary"),
        ));
    }
    if !method.sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            span,
            format!("method '{name}': generic methods cannot occupy a vtable slot"),
        ));
    }
    if method.default.is_some() {
        return Err(syn::Error::new(
            span,
            format!("method '{name}': default bodies are not allowed; implementations supply them"),
        ));
    }

    // Implementations are shared with native code, so only `&self` works;
    // mutation goes through interior mutability.
    match method.sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        Some(FnArg::Receiver(receiver)) => {
            return Err(syn::Error::new(
                receiver.self_token.span(),
                format!("method '{name}': the receiver must be &self"),
            ));
        }
        _ => {
            return Err(syn::Error::new(
                span,
                format!("method '{name}': vtable methods need a &self receiver"),
            ));
        }
    }

    for arg in &method.sig.inputs {
        if let FnArg::Typed(pat_type) = arg {
            if !matches!(pat_type.pat.as_ref(), Pat::Ident(_)) {
                return Err(syn::Error::new(
                    pat_type.pat.span(),
                    format!("method '{name}': parameters must be plain identifiers"),
                ));
            }
            if let Err(msg) = check_boundary_type(&pat_type.ty) {
                return Err(syn::Error::new(
                    pat_type.ty.span(),
                    format!("method '{name}': {msg}"),
                ));
            }
        }
    }

    if let syn::ReturnType::Type(_, ty) = &method.sig.output
        && let Err(msg) = check_boundary_type(ty)
    {
        return Err(syn::Error::new(
            ty.span(),
            format!("method '{name}': return type: {msg}"),
        ));
    }

    Ok(())
}

fn validate_trait(input: &ItemTrait) -> Result<(), syn::Error> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "bridged interfaces cannot be generic",
        ));
    }
    if !input.supertraits.is_empty() {
        return Err(syn::Error::new(
            input.supertraits.span(),
            "declare the base interface with extends(...), not a supertrait",
        ));
    }
    for item in &input.items {
        match item {
            TraitItem::Fn(method) => validate_method(method)?,
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "bridged interfaces may only declare methods",
                ));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Generation
// =============================================================================

struct MethodInfo {
    name: Ident,
    param_names: Vec<Ident>,
    param_types: Vec<Type>,
    output: syn::ReturnType,
}

fn collect_methods(input: &ItemTrait) -> Vec<MethodInfo> {
    input
        .items
        .iter()
        .filter_map(|item| {
            let TraitItem::Fn(method) = item else {
                return None;
            };
            let params: Vec<_> = method
                .sig
                .inputs
                .iter()
                .filter_map(|arg| {
                    if let FnArg::Typed(pat_type) = arg
                        && let Pat::Ident(pat_ident) = pat_type.pat.as_ref()
                    {
                        return Some((pat_ident.ident.clone(), (*pat_type.ty).clone()));
                    }
                    None
                })
                .collect();
            Some(MethodInfo {
                name: method.sig.ident.clone(),
                param_names: params.iter().map(|(n, _)| n.clone()).collect(),
                param_types: params.iter().map(|(_, t)| t.clone()).collect(),
                output: method.sig.output.clone(),
            })
        })
        .collect()
}

fn com_interface_internal(
    config: InterfaceConfig,
    input: ItemTrait,
) -> Result<TokenStream2, syn::Error> {
    validate_trait(&input)?;

    let vis = &input.vis;
    let trait_name = &input.ident;
    let trait_docs: Vec<_> = input
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .collect();

    let name_str = trait_name.to_string();
    let vtable_name = format_ident!("{}Vtable", trait_name);
    let impl_trait_name = format_ident!("{}Impl", trait_name);
    let desc_static = format_ident!("{}_DESC", name_str.to_uppercase());
    let iid_const = format_ident!("IID_{}", name_str.to_uppercase());

    // Base interface plumbing. The implicit root is combridge::IUnknown.
    let (base_vtable_ty, base_vtable_new, base_proxy_ty, base_impl_ty, base_desc) =
        match &config.base {
            Some(base) => {
                let base_vtable = format_ident!("{}Vtable", base);
                let base_impl = format_ident!("{}Impl", base);
                (
                    quote! { #base_vtable },
                    quote! { #base_vtable::new::<D, T>() },
                    quote! { #base },
                    quote! { #base_impl },
                    quote! { <#base as combridge::Interface>::DESC },
                )
            }
            None => (
                quote! { combridge::IUnknownVtable },
                quote! { combridge::IUnknownVtable::new::<D, T>() },
                quote! { combridge::IUnknown },
                quote! { combridge::IUnknownImpl },
                quote! { <combridge::IUnknown as combridge::Interface>::DESC },
            ),
        };

    let iid_value = match config.guid {
        Some((data1, data2, data3, data4)) => {
            let bytes = data4.iter();
            quote! { combridge::Guid::new(#data1, #data2, #data3, [#(#bytes),*]) }
        }
        None => quote! { combridge::Guid::ZERO },
    };

    let methods = collect_methods(&input);

    let mut vtable_fields = Vec::new();
    let mut method_descs = Vec::new();
    let mut proxy_methods = Vec::new();
    let mut impl_trait_methods = Vec::new();
    let mut thunks = Vec::new();
    let mut thunk_entries = Vec::new();

    for method in &methods {
        let name = &method.name;
        let name_lit = name.to_string();
        let param_names = &method.param_names;
        let param_types = &method.param_types;
        let output = &method.output;

        vtable_fields.push(quote! {
            pub #name: unsafe extern "system" fn(
                this: *mut ::std::ffi::c_void
                #(, #param_names: #param_types)*
            ) #output
        });

        method_descs.push(quote! {
            combridge::MethodDesc { name: #name_lit }
        });

        // Outbound: stored object pointer becomes the implicit first
        // argument of the typed slot.
        proxy_methods.push(quote! {
            #[inline]
            pub unsafe fn #name(&self #(, #param_names: #param_types)*) #output {
                let vtable: &#vtable_name =
                    unsafe { combridge::Interface::com_ptr(self).vtable() };
                unsafe {
                    (vtable.#name)(
                        combridge::Interface::com_ptr(self).as_raw()
                        #(, #param_names)*
                    )
                }
            }
        });

        impl_trait_methods.push(quote! {
            fn #name(&self #(, #param_names: #param_types)*) #output;
        });

        // Inbound: recover the implementation from the opaque handle beside
        // the vtable pointer, drop `this`, forward the rest.
        thunks.push(quote! {
            unsafe extern "system" fn #name<T: #impl_trait_name>(
                this: *mut ::std::ffi::c_void
                #(, #param_names: #param_types)*
            ) #output {
                let object = unsafe { combridge::object::recover::<T>(this) };
                object.#name(#(#param_names),*)
            }
        });

        thunk_entries.push(quote! {
            #name: #name::<T>
        });
    }

    let expanded = quote! {
        #vis const #iid_const: combridge::Guid = #iid_value;

        /// Slot table for this interface; embeds the base vtable first, so
        /// the flattened layout is base methods, then these, in order.
        #[repr(C)]
        #vis struct #vtable_name {
            pub base: #base_vtable_ty,
            #(#vtable_fields),*
        }

        #vis static #desc_static: combridge::InterfaceDesc = combridge::InterfaceDesc {
            name: #name_str,
            iid: #iid_const,
            base: Some(#base_desc),
            methods: &[#(#method_descs),*],
        };

        #(#trait_docs)*
        #[repr(transparent)]
        #[derive(Clone, PartialEq, Eq, Hash)]
        #vis struct #trait_name(combridge::ComPtr);

        unsafe impl combridge::Interface for #trait_name {
            type Vtable = #vtable_name;
            const IID: combridge::Guid = #iid_const;
            const DESC: &'static combridge::InterfaceDesc = &#desc_static;

            unsafe fn from_com_ptr(ptr: combridge::ComPtr) -> Self {
                Self(ptr)
            }

            fn com_ptr(&self) -> &combridge::ComPtr {
                &self.0
            }
        }

        impl ::std::ops::Deref for #trait_name {
            type Target = #base_proxy_ty;

            #[inline]
            fn deref(&self) -> &Self::Target {
                // Both sides are #[repr(transparent)] over ComPtr.
                unsafe { &*(self as *const Self as *const Self::Target) }
            }
        }

        impl ::std::fmt::Debug for #trait_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(
                    f,
                    "{}({:p})",
                    #name_str,
                    combridge::Interface::com_ptr(self).as_raw()
                )
            }
        }

        impl #trait_name {
            #(#proxy_methods)*
        }

        /// Contract for managed implementations exposed as this interface.
        #vis trait #impl_trait_name: #base_impl_ty {
            #(#impl_trait_methods)*
        }

        impl #vtable_name {
            /// Thunk table exposing a `T` as this interface. `D` is the
            /// most-derived interface of the synthetic object.
            pub const fn new<D, T>() -> Self
            where
                D: combridge::Interface,
                T: #impl_trait_name,
            {
                #(#thunks)*

                Self {
                    base: #base_vtable_new,
                    #(#thunk_entries),*
                }
            }
        }

        unsafe impl<T: #impl_trait_name> combridge::InterfaceVtable<T> for #trait_name {
            const VTABLE: #vtable_name = #vtable_name::new::<#trait_name, T>();
        }
    };

    Ok(expanded)
}

/// Declare a bridged COM-style interface from a trait definition.
///
/// See the crate docs for the generated items and options.
#[proc_macro_attribute]
pub fn com_interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    let config = match parse_config(attr) {
        Ok(config) => config,
        Err(err) => return err.to_compile_error().into(),
    };
    let input = parse_macro_input!(item as ItemTrait);
    match com_interface_internal(config, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
