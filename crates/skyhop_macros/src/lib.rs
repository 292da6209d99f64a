use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{ImplItem, ItemImpl, parse_macro_input};

/// Maps `#[Event::Xxx]` attribute names to `SkyhopPlugin` trait method names.
fn event_to_trait_method(event_name: &str) -> Option<&'static str> {
    match event_name {
        "Jumped" => Some("on_jumped"),
        "WallJumped" => Some("on_wall_jumped"),
        "ApexReached" => Some("on_apex_reached"),
        "Landed" => Some("on_landed"),
        "AnimationChanged" => Some("on_animation_changed"),
        "RemoteAvatarJoin" => Some("on_remote_avatar_join"),
        "RemoteAvatarLeave" => Some("on_remote_avatar_leave"),
        _ => None,
    }
}

/// Proc-macro attribute that generates a `SkyhopPlugin` trait implementation.
///
/// # Usage
/// ```ignore
/// #[skyhop_plugin]
/// impl MyPlugin {
///     #[Event::Landed]
///     fn on_land(&self, event: &LandedEvent) {
///         info!("Landed at {:?}", event.position);
///     }
/// }
/// ```
///
/// This generates:
/// - The original `impl MyPlugin` block (with event attributes stripped)
/// - An `impl skyhop_client::events::SkyhopPlugin for MyPlugin` that delegates
///   to the annotated methods
#[proc_macro_attribute]
pub fn skyhop_plugin(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(item as ItemImpl);
    let self_ty = &input.self_ty;

    let mut trait_methods = Vec::new();
    let mut errors = Vec::new();

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };

        // Find and remove #[Event::Xxx] attributes
        let mut event = None;
        method.attrs.retain(|attr| {
            let segments: Vec<_> = attr.path().segments.iter().collect();
            if segments.len() == 2 && segments[0].ident == "Event" {
                event = Some((segments[1].ident.to_string(), attr.span()));
                return false;
            }
            true
        });

        let Some((name, span)) = event else {
            continue;
        };

        let Some(trait_method_name) = event_to_trait_method(&name) else {
            errors.push(syn::Error::new(span, format!("unknown skyhop event `{name}`")));
            continue;
        };

        let trait_method_ident = syn::Ident::new(trait_method_name, method.sig.ident.span());
        let user_method_ident = &method.sig.ident;

        // Second parameter carries the event type: &self, event: &EventType
        let event_type = method.sig.inputs.iter().nth(1).and_then(|arg| {
            if let syn::FnArg::Typed(pat_type) = arg {
                Some(&pat_type.ty)
            } else {
                None
            }
        });
        let Some(event_type) = event_type else {
            errors.push(syn::Error::new(
                method.sig.span(),
                "event handler must take the event as its second parameter",
            ));
            continue;
        };

        trait_methods.push(quote! {
            fn #trait_method_ident(&self, event: #event_type) {
                self.#user_method_ident(event)
            }
        });
    }

    if let Some(mut combined) = errors.pop() {
        for error in errors {
            combined.combine(error);
        }
        return combined.to_compile_error().into();
    }

    let expanded = quote! {
        #input

        impl ::skyhop_client::events::SkyhopPlugin for #self_ty {
            #(#trait_methods)*
        }
    };

    expanded.into()
}
