use proc_macro::TokenStream;
use quote::quote;
use syn::{
  parse::{Parse, ParseStream},
  punctuated::Punctuated,
  Ident, ItemFn, Token,
};

struct Args {
  level: proc_macro2::TokenStream,
  paused: bool,
}

impl Parse for Args {
  fn parse(input: ParseStream) -> syn::Result<Self> {
    let idents = Punctuated::<Ident, Token![,]>::parse_terminated(input)?;

    let mut args = Args {
      level: quote! { log::Level::Trace },
      paused: false,
    };

    for ident in idents {
      match ident.to_string().as_str() {
        "paused" => args.paused = true,
        "trace" => args.level = quote! { log::Level::Trace },
        "debug" => args.level = quote! { log::Level::Debug },
        "info" => args.level = quote! { log::Level::Info },
        "warn" => args.level = quote! { log::Level::Warn },
        "error" => args.level = quote! { log::Level::Error },
        other => {
          return Err(syn::Error::new(
            ident.span(),
            format!("Unknown test option `{}`", other),
          ))
        }
      }
    }

    Ok(args)
  }
}

/// Marks a test that runs with the logger installed.
///
/// `async fn` tests run on a tokio runtime. Pass `paused` to start the runtime
/// with a paused clock so timers auto-advance, and a level (`debug`, `info`, ...)
/// to change the log level from the default `trace`.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let item_fn = syn::parse_macro_input!(item as ItemFn);
  let args = syn::parse_macro_input!(attr as Args);

  let attrs = item_fn.attrs;
  let test_name = item_fn.sig.ident;
  let output = item_fn.sig.output;
  let content = item_fn.block;

  let is_async = item_fn.sig.asyncness.is_some();
  let level = args.level;

  let content = quote! {
    docstream_logger::init_logger_with_level(#level);

    #content
  };

  if is_async {
    let runtime = if args.paused {
      quote! { #[tokio::test(start_paused = true)] }
    } else {
      quote! { #[tokio::test] }
    };

    return quote! {
      #runtime
      #(#attrs)*
      async fn #test_name() #output {
        #content
      }
    }
    .into();
  }

  if args.paused {
    return syn::Error::new(
      test_name.span(),
      "`paused` is only supported on async tests",
    )
    .to_compile_error()
    .into();
  }

  quote! {
    #[test]
    #(#attrs)*
    fn #test_name() #output {
      #content
    }
  }
  .into()
}
