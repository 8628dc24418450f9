use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, ItemFn};

/// Test attribute shared by every test in the workspace.
///
/// - sync tests become `#[test]` natively and `wasm_bindgen_test` on wasm32.
/// - async tests run on a tokio current-thread runtime inside a
///   `tokio::task::LocalSet`, so `spawn_local` based schedulers work. On
///   wasm32 they become `wasm_bindgen_test` async tests.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);

  let raw_args = proc_macro2::TokenStream::from(attr);
  if !raw_args.is_empty() {
    return TokenStream::from(
      syn::Error::new(
        raw_args.span(),
        "external_subject_macro::test takes no arguments; every test runs on a single thread",
      )
      .to_compile_error(),
    );
  }

  if input.sig.asyncness.is_none() {
    return TokenStream::from(quote! {
        #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
        #[cfg_attr(not(target_arch = "wasm32"), test)]
        #input
    });
  }

  let ItemFn { attrs, vis, sig, block } = &input;
  let expanded = quote! {
      #[cfg(target_arch = "wasm32")]
      #[wasm_bindgen_test::wasm_bindgen_test]
      #input

      #[cfg(not(target_arch = "wasm32"))]
      #[tokio::test(flavor = "current_thread")]
      #(#attrs)*
      #vis #sig {
        tokio::task::LocalSet::new()
          .run_until(async move #block)
          .await
      }
  };

  TokenStream::from(expanded)
}
