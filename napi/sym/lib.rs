// Copyright 2018-2026 the Deno authors. MIT license.

use proc_macro::TokenStream;
use quote::quote;
use syn::FnArg;
use syn::Pat;
use syn::Type;

/// Turns `fn napi_x(env: *mut Env, ..) -> Result` into the exported
/// `extern "C"` symbol returning a `napi_status`.
///
/// When the first argument is a `*mut Env`, the environment's last error is
/// cleared before the body runs and the resulting status is recorded after.
#[proc_macro_attribute]
pub fn napi_sym(_attr: TokenStream, item: TokenStream) -> TokenStream {
  let func = syn::parse::<syn::ItemFn>(item).expect("expected a function");

  let name = &func.sig.ident;
  let block = &func.block;
  let inputs = &func.sig.inputs;
  let output = &func.sig.output;
  let attrs = &func.attrs;
  let ret_ty = match output {
    syn::ReturnType::Default => panic!("expected a return type"),
    syn::ReturnType::Type(_, ty) => quote! { #ty },
  };

  let (prologue, epilogue) = match env_argument(&func.sig) {
    Some(env) => (
      quote! {
        let __napi_env: *mut Env = #env;
        crate::env::clear_last_error(__napi_env);
      },
      quote! {
        crate::env::set_last_status(__napi_env, status)
      },
    ),
    None => (quote! {}, quote! { status }),
  };

  TokenStream::from(quote! {
      #(#attrs)*
      #[allow(unsafe_op_in_unsafe_fn)]
      #[allow(clippy::not_unsafe_ptr_arg_deref)]
      #[allow(clippy::too_many_arguments)]
      #[allow(unused_mut)]
      #[unsafe(no_mangle)]
      pub unsafe extern "C" fn #name(#inputs) -> napi_status {
        #prologue
        let mut inner = || -> #ret_ty #block;
        let status: napi_status = match inner() {
          Ok(_) => napi_ok,
          Err(err) => err.into(),
        };
        #epilogue
      }
  })
}

fn env_argument(sig: &syn::Signature) -> Option<syn::Ident> {
  let Some(FnArg::Typed(first)) = sig.inputs.first() else {
    return None;
  };
  let Pat::Ident(ident) = &*first.pat else {
    return None;
  };
  let Type::Ptr(ptr) = &*first.ty else {
    return None;
  };
  let Type::Path(path) = &*ptr.elem else {
    return None;
  };
  let is_env = path
    .path
    .segments
    .last()
    .map(|segment| segment.ident == "Env")
    .unwrap_or(false);
  is_env.then(|| ident.ident.clone())
}
