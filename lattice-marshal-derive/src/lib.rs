mod marshal;

use proc_macro::TokenStream;

#[proc_macro_derive(Marshal, attributes(marshal))]
pub fn derive_marshal(input: TokenStream) -> TokenStream {
	marshal::derive(input).into()
}
