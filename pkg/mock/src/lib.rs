//! Procedural macros for generating mock implementations.
//!
//! # client
//!
//! Generates a queue-backed mock for an async trait.
//!
//! Use `#[cfg_attr(test, mock::client)]` before `#[async_trait]` so the mock
//! only exists during test compilation:
//!
//! ```ignore
//! use tonic::async_trait;
//!
//! #[cfg_attr(test, mock::client)]
//! #[async_trait]
//! pub trait KeySetSource: Send + Sync + 'static {
//!     async fn fetch_key_set(&self, url: &str) -> Result<Arc<KeySet>, KeySetError>;
//!
//!     async fn refresh_key_set(
//!         &self,
//!         _url: &str,
//!         _seen: &Arc<KeySet>,
//!     ) -> Result<Option<Arc<KeySet>>, KeySetError> {
//!         Ok(None)
//!     }
//! }
//!
//! // Generates:
//! // pub struct MockKeySetSource {
//! //     pub fetch_key_set: Mutex<VecDeque<Result<Arc<KeySet>, KeySetError>>>,
//! //     pub fetch_key_set_call_count: AtomicUsize,
//! // }
//! // impl Default for MockKeySetSource { ... }
//! // #[async_trait] impl KeySetSource for MockKeySetSource { ... }
//! ```
//!
//! Every call pops the next queued response. Methods with a default body keep
//! their default implementation and are not mocked. Methods without a return
//! value are only counted.
//!
//! ## Checking Call Counts in Tests
//!
//! ```ignore
//! assert_eq!(mock.fetch_key_set_calls(), 0);
//! ```

use proc_macro::TokenStream;
use quote::ToTokens;
use quote::{format_ident, quote};
use syn::{FnArg, ItemTrait, ReturnType, TraitItem, parse_macro_input};

/// Generates a mock implementation for an async trait.
#[proc_macro_attribute]
pub fn client(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);
    let trait_name = &input.ident;
    let mock_name = format_ident!("Mock{}", trait_name);
    let vis = &input.vis;

    let mut field_definitions = Vec::new();
    let mut default_fields = Vec::new();
    let mut impl_methods = Vec::new();
    let mut call_count_methods = Vec::new();

    for item in &input.items {
        let TraitItem::Fn(method) = item else {
            continue;
        };
        if method.default.is_some() {
            continue;
        }

        let method_name = &method.sig.ident;
        let method_label = method_name.to_string();
        let call_count_field = format_ident!("{}_call_count", method_name);
        let call_count_method = format_ident!("{}_calls", method_name);

        field_definitions.push(quote! {
            pub #call_count_field: ::std::sync::atomic::AtomicUsize
        });
        default_fields.push(quote! {
            #call_count_field: ::std::sync::atomic::AtomicUsize::new(0)
        });
        call_count_methods.push(quote! {
            pub fn #call_count_method(&self) -> usize {
                self.#call_count_field.load(::std::sync::atomic::Ordering::SeqCst)
            }
        });

        let params: Vec<_> = method
            .sig
            .inputs
            .iter()
            .filter_map(|arg| {
                if let FnArg::Typed(pat_type) = arg {
                    let ty = &pat_type.ty;
                    let pat_str = pat_type.pat.to_token_stream().to_string();
                    let prefixed_name = format_ident!("_{}", pat_str.trim_start_matches('_'));
                    Some(quote! { #prefixed_name: #ty })
                } else {
                    None
                }
            })
            .collect();

        match &method.sig.output {
            ReturnType::Default => {
                impl_methods.push(quote! {
                    async fn #method_name(&self, #(#params),*) {
                        self.#call_count_field.fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
            ReturnType::Type(_, ty) => {
                field_definitions.push(quote! {
                    pub #method_name: ::tokio::sync::Mutex<::std::collections::VecDeque<#ty>>
                });
                default_fields.push(quote! {
                    #method_name: ::tokio::sync::Mutex::new(::std::collections::VecDeque::new())
                });
                impl_methods.push(quote! {
                    async fn #method_name(&self, #(#params),*) -> #ty {
                        self.#call_count_field.fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
                        self.#method_name
                            .lock()
                            .await
                            .pop_front()
                            .unwrap_or_else(|| panic!("no queued response for {}", #method_label))
                    }
                });
            }
        }
    }

    let expanded = quote! {
        #input

        #vis struct #mock_name {
            #(#field_definitions),*
        }

        impl ::std::default::Default for #mock_name {
            fn default() -> Self {
                Self {
                    #(#default_fields),*
                }
            }
        }

        impl #mock_name {
            #(#call_count_methods)*
        }

        #[::tonic::async_trait]
        impl #trait_name for #mock_name {
            #(#impl_methods)*
        }
    };

    TokenStream::from(expanded)
}
