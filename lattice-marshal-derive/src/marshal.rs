//! `#[derive(Marshal)]` codegen.
//!
//! Field dispatch follows the same "match a known special-case type name,
//! else fall through to the generic path" shape `TableDerive` uses in
//! `table.rs` to special-case `StringIndex` columns; here the special cases
//! are every type the hand-written `Wire` impls in `lattice_marshal::wire`
//! cover, and the generic fallback is "this field is itself a directly
//! nested `Reflected` struct".

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, Path, Token, Type};

pub fn derive(tokens: proc_macro::TokenStream) -> TokenStream {
	let input: DeriveInput = syn::parse(tokens).unwrap();

	if !input.generics.params.is_empty() {
		panic!("`#[derive(Marshal)]` does not support generic types");
	}

	match &input.data {
		Data::Struct(data) => derive_struct(&input, data),
		Data::Enum(data) => derive_enum(&input, data),
		Data::Union(_) => panic!("`#[derive(Marshal)]` does not support unions"),
	}
}

// -- attribute parsing --------------------------------------------------

/// One `persistent_fields(...)` entry: a bare `name` refers to an existing
/// struct field (its type is classified the normal way); `name: Type` names
/// a field that has no backing struct field at all (spec.md §3: "may name
/// fields that do not physically exist — null offset; zero-valued on write,
/// ignored on read"), with `Type` supplying the kind that phantom entry
/// should be written/read as, the same way Java's `ObjectStreamField`
/// carries an explicit type for fields `serialPersistentFields` invents.
struct PersistentFieldSpec {
	name: Ident,
	phantom_ty: Option<Type>,
}

impl Parse for PersistentFieldSpec {
	fn parse(input: ParseStream) -> syn::Result<Self> {
		let name: Ident = input.parse()?;
		let phantom_ty = if input.peek(Token![:]) {
			input.parse::<Token![:]>()?;
			Some(input.parse()?)
		} else {
			None
		};
		Ok(PersistentFieldSpec { name, phantom_ty })
	}
}

struct StructAttrs {
	extends: Option<Path>,
	persistent_fields: Option<Vec<PersistentFieldSpec>>,
}

fn parse_struct_attrs(attrs: &[Attribute]) -> StructAttrs {
	let mut extends = None;
	let mut persistent_fields = None;

	for attr in attrs {
		if !attr.path().is_ident("marshal") {
			continue;
		}
		attr.parse_nested_meta(|meta| {
			if meta.path.is_ident("extends") {
				let value = meta.value()?;
				let path: Path = value.parse()?;
				extends = Some(path);
				Ok(())
			} else if meta.path.is_ident("persistent_fields") {
				let content;
				syn::parenthesized!(content in meta.input);
				let specs = content.parse_terminated(PersistentFieldSpec::parse, syn::Token![,])?;
				persistent_fields = Some(specs.into_iter().collect());
				Ok(())
			} else {
				Err(meta.error("unrecognized `marshal` attribute"))
			}
		})
		.unwrap();
	}

	StructAttrs { extends, persistent_fields }
}

fn field_is_skipped(field: &Field) -> bool {
	field.attrs.iter().any(|attr| {
		if !attr.path().is_ident("marshal") {
			return false;
		}
		let mut skip = false;
		attr.parse_nested_meta(|meta| {
			if meta.path.is_ident("skip") {
				skip = true;
				Ok(())
			} else {
				Err(meta.error("unrecognized `marshal` attribute"))
			}
		})
		.unwrap();
		skip
	})
}

// -- field-kind classification --------------------------------------------------

enum Dispatch {
	Primitive(&'static str),
	/// Implements `wire::Wire` directly: `Option<T>`, `Arc<T>`, containers,
	/// `String`, `Uuid`, `Timestamp`, primitive arrays, etc.
	Wire,
	/// A directly nested `Reflected` struct with no wrapper.
	Object,
}

fn classify(ty: &Type) -> Dispatch {
	let Type::Path(path) = ty else { return Dispatch::Object };
	let Some(last) = path.path.segments.last() else { return Dispatch::Object };
	let ident = last.ident.to_string();

	match ident.as_str() {
		"bool" => Dispatch::Primitive("bool"),
		"i8" => Dispatch::Primitive("byte"),
		"i16" => Dispatch::Primitive("short"),
		"i32" => Dispatch::Primitive("int"),
		"i64" => Dispatch::Primitive("long"),
		"f32" => Dispatch::Primitive("float"),
		"f64" => Dispatch::Primitive("double"),
		"char" => Dispatch::Primitive("char"),
		"String" | "Option" | "Arc" | "Vec" | "HashMap" | "HashSet" | "IndexMap" | "IndexSet" | "BTreeMap" | "ArrayList" | "LinkedList" | "ObjectArray" | "Uuid" | "Timestamp" | "ClassRef" | "Ext"
		| "Aware" => Dispatch::Wire,
		_ => Dispatch::Object,
	}
}

fn field_kind_tokens(dispatch: &Dispatch) -> TokenStream {
	match dispatch {
		Dispatch::Primitive("bool") => quote!(lattice_marshal::FieldKind::Bool),
		Dispatch::Primitive("byte") => quote!(lattice_marshal::FieldKind::Byte),
		Dispatch::Primitive("short") => quote!(lattice_marshal::FieldKind::Short),
		Dispatch::Primitive("int") => quote!(lattice_marshal::FieldKind::Int),
		Dispatch::Primitive("long") => quote!(lattice_marshal::FieldKind::Long),
		Dispatch::Primitive("float") => quote!(lattice_marshal::FieldKind::Float),
		Dispatch::Primitive("double") => quote!(lattice_marshal::FieldKind::Double),
		Dispatch::Primitive("char") => quote!(lattice_marshal::FieldKind::Char),
		Dispatch::Primitive(_) => unreachable!(),
		Dispatch::Wire | Dispatch::Object => quote!(lattice_marshal::FieldKind::Other),
	}
}

// -- struct derivation --------------------------------------------------

fn derive_struct(input: &DeriveInput, data: &syn::DataStruct) -> TokenStream {
	let ident = &input.ident;
	let type_name = ident.to_string();
	let attrs = parse_struct_attrs(&input.attrs);

	let Fields::Named(named) = &data.fields else {
		panic!("`#[derive(Marshal)]` requires named fields");
	};

	let mut base_field: Option<(&Field, Path)> = None;
	if let Some(extends) = &attrs.extends {
		let base_ty_name = extends.segments.last().unwrap().ident.to_string();
		base_field = named.named.iter().find_map(|f| match &f.ty {
			Type::Path(p) if p.path.segments.last().unwrap().ident == base_ty_name => Some((f, extends.clone())),
			_ => None,
		});
		if base_field.is_none() {
			panic!("`#[marshal(extends = {base_ty_name})]` requires a field of type `{base_ty_name}` to compose the base into");
		}
	}

	let included: Vec<&Field> = named
		.named
		.iter()
		.filter(|f| !field_is_skipped(f))
		.filter(|f| base_field.as_ref().map_or(true, |(bf, _)| !std::ptr::eq(*f, *bf)))
		.collect();

	// One entry in this type's own field order: either a real struct field,
	// or a `persistent_fields` name with no backing storage (spec.md §3
	// phantom field — written as zero, ignored on read).
	enum OrderedField<'a> {
		Real(&'a Field),
		Phantom { name: Ident, ty: Type },
	}

	let ordered: Vec<OrderedField> = if let Some(order) = &attrs.persistent_fields {
		order
			.iter()
			.map(|spec| {
				if let Some(found) = included.iter().find(|f| f.ident.as_ref().unwrap() == &spec.name) {
					OrderedField::Real(found)
				} else {
					let ty = spec.phantom_ty.clone().unwrap_or_else(|| {
						panic!(
							"`persistent_fields` names `{}`, which is not a field of `{type_name}` — give a \
							 phantom field's type explicitly with `{}: SomeType` so its wire kind is known",
							spec.name, spec.name
						)
					});
					OrderedField::Phantom { name: spec.name.clone(), ty }
				}
			})
			.collect()
	} else {
		let mut sorted: Vec<OrderedField> = included.iter().map(|f| OrderedField::Real(f)).collect();
		sorted.sort_by_key(|of| match of {
			OrderedField::Real(f) => f.ident.as_ref().unwrap().to_string(),
			OrderedField::Phantom { name, .. } => name.to_string(),
		});
		sorted
	};

	// Base-first (spec.md §3 field-order invariant): the composed base field,
	// if any, always leads this type's own sorted/explicit field order.
	let all_fields: Vec<OrderedField> = base_field.iter().map(|(f, _)| OrderedField::Real(f)).chain(ordered).collect();

	let field_names: Vec<String> = all_fields
		.iter()
		.map(|of| match of {
			OrderedField::Real(f) => f.ident.as_ref().unwrap().to_string(),
			OrderedField::Phantom { name, .. } => name.to_string(),
		})
		.collect();
	let dispatches: Vec<Dispatch> = all_fields
		.iter()
		.enumerate()
		.map(|(i, of)| {
			if i == 0 && base_field.is_some() {
				Dispatch::Object
			} else {
				match of {
					OrderedField::Real(f) => classify(&f.ty),
					OrderedField::Phantom { ty, .. } => classify(ty),
				}
			}
		})
		.collect();
	let kind_tokens: Vec<TokenStream> = dispatches.iter().map(field_kind_tokens).collect();
	let phantom_flags: Vec<bool> = all_fields.iter().map(|of| matches!(of, OrderedField::Phantom { .. })).collect();

	let schema_entries = field_names.iter().zip(&kind_tokens).map(|(name, kind)| quote!((#name, #kind)));

	let write_stmts = all_fields.iter().enumerate().map(|(i, of)| {
		let idx = i;
		match of {
			OrderedField::Phantom { .. } => match &dispatches[i] {
				Dispatch::Primitive("bool") => quote!(out.field_bool(&mut footer, &descriptor.fields[#idx], false);),
				Dispatch::Primitive("byte") => quote!(out.field_byte(&mut footer, &descriptor.fields[#idx], 0);),
				Dispatch::Primitive("short") => quote!(out.field_short(&mut footer, &descriptor.fields[#idx], 0);),
				Dispatch::Primitive("int") => quote!(out.field_int(&mut footer, &descriptor.fields[#idx], 0);),
				Dispatch::Primitive("long") => quote!(out.field_long(&mut footer, &descriptor.fields[#idx], 0);),
				Dispatch::Primitive("float") => quote!(out.field_float(&mut footer, &descriptor.fields[#idx], 0.0);),
				Dispatch::Primitive("double") => quote!(out.field_double(&mut footer, &descriptor.fields[#idx], 0.0);),
				Dispatch::Primitive("char") => quote!(out.field_char(&mut footer, &descriptor.fields[#idx], '\0');),
				Dispatch::Primitive(_) => unreachable!(),
				// No value exists to write for a Wire/Object-kind phantom
				// field; `null` is the zero value spec.md §3 asks for.
				Dispatch::Wire | Dispatch::Object => quote!(out.field_phantom(&mut footer, &descriptor.fields[#idx]);),
			},
			OrderedField::Real(f) => {
				let fident = f.ident.as_ref().unwrap();
				match &dispatches[i] {
					Dispatch::Primitive("bool") => quote!(out.field_bool(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive("byte") => quote!(out.field_byte(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive("short") => quote!(out.field_short(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive("int") => quote!(out.field_int(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive("long") => quote!(out.field_long(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive("float") => quote!(out.field_float(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive("double") => quote!(out.field_double(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive("char") => quote!(out.field_char(&mut footer, &descriptor.fields[#idx], self.#fident);),
					Dispatch::Primitive(_) => unreachable!(),
					Dispatch::Wire => quote!(out.field_other(&mut footer, &descriptor.fields[#idx], &self.#fident)?;),
					Dispatch::Object => quote!(out.field_object(&mut footer, &descriptor.fields[#idx], &self.#fident)?;),
				}
			}
		}
	});

	let read_stmts = all_fields.iter().enumerate().map(|(i, of)| {
		let idx = i;
		match of {
			OrderedField::Phantom { .. } => {
				let discard = match &dispatches[i] {
					Dispatch::Primitive("bool") => quote!(input.field_bool(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive("byte") => quote!(input.field_byte(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive("short") => quote!(input.field_short(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive("int") => quote!(input.field_int(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive("long") => quote!(input.field_long(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive("float") => quote!(input.field_float(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive("double") => quote!(input.field_double(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive("char") => quote!(input.field_char(active, &descriptor.fields[#idx])?;),
					Dispatch::Primitive(_) => unreachable!(),
					Dispatch::Wire | Dispatch::Object => quote!(input.field_phantom(active, &descriptor.fields[#idx])?;),
				};
				quote! { #discard }
			}
			OrderedField::Real(f) => {
				let fident = f.ident.as_ref().unwrap();
				let fty = &f.ty;
				let expr = match &dispatches[i] {
					Dispatch::Primitive("bool") => quote!(input.field_bool(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive("byte") => quote!(input.field_byte(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive("short") => quote!(input.field_short(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive("int") => quote!(input.field_int(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive("long") => quote!(input.field_long(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive("float") => quote!(input.field_float(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive("double") => quote!(input.field_double(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive("char") => quote!(input.field_char(active, &descriptor.fields[#idx])?),
					Dispatch::Primitive(_) => unreachable!(),
					Dispatch::Wire => quote!(input.field_other::<#fty>(active, &descriptor.fields[#idx])?),
					Dispatch::Object => quote!(input.field_object::<#fty>(active, &descriptor.fields[#idx])?),
				};
				quote! {
					std::ptr::addr_of_mut!((*ptr).#fident).write(#expr);
				}
			}
		}
	});

	let skipped_defaults = named.named.iter().filter(|f| field_is_skipped(f)).map(|f| {
		let fident = f.ident.as_ref().unwrap();
		quote! {
			std::ptr::addr_of_mut!((*ptr).#fident).write(Default::default());
		}
	});

	let has_write_replace = false;
	let has_read_resolve = false;
	let has_custom_hooks = false;

	quote! {
		impl lattice_marshal::Marshal for #ident {
			fn type_name(&self) -> &'static str {
				#type_name
			}

			fn write_fields(&self, out: &mut lattice_marshal::OutputStream, descriptor: &lattice_marshal::Descriptor) -> lattice_marshal::Result<()> {
				let mut footer = out.begin_fields(descriptor);
				#(#write_stmts)*
				out.end_fields(footer);
				Ok(())
			}

			fn dyn_descriptor(&self, id_mapper: Option<&dyn lattice_marshal::IdMapper>) -> lattice_marshal::Descriptor {
				<Self as lattice_marshal::Reflected>::build_descriptor(id_mapper)
			}

			fn as_any(&self) -> &dyn std::any::Any {
				self
			}
		}

		impl lattice_marshal::Reflected for #ident {
			fn type_name() -> &'static str {
				#type_name
			}

			fn build_descriptor(id_mapper: Option<&dyn lattice_marshal::IdMapper>) -> lattice_marshal::Descriptor {
				lattice_marshal::Descriptor::build(
					#type_name,
					id_mapper,
					lattice_marshal::Capability::Serializable,
					&[#(#schema_entries),*],
					vec![#((#field_names, #kind_tokens, #phantom_flags)),*],
					vec![],
					#has_write_replace,
					#has_read_resolve,
					#has_custom_hooks,
					true,
					true,
				)
			}

			fn allocate_and_read(input: &mut lattice_marshal::InputStream, descriptor: &lattice_marshal::Descriptor) -> lattice_marshal::Result<Self> {
				let active = input.begin_fields(descriptor);
				let mut uninit = std::mem::MaybeUninit::<Self>::uninit();
				let ptr = uninit.as_mut_ptr();
				unsafe {
					#(#read_stmts)*
					#(#skipped_defaults)*
				}
				input.end_fields(active, descriptor);
				Ok(unsafe { uninit.assume_init() })
			}
		}
	}
}

// -- enum derivation --------------------------------------------------

fn derive_enum(input: &DeriveInput, data: &syn::DataEnum) -> TokenStream {
	let ident = &input.ident;
	let type_name = ident.to_string();

	for variant in &data.variants {
		if !matches!(variant.fields, Fields::Unit) {
			panic!("`#[derive(Marshal)]` on enum `{type_name}` requires fieldless variants; `{}` carries data", variant.ident);
		}
	}

	let variant_idents: Vec<&Ident> = data.variants.iter().map(|v| &v.ident).collect();
	let variant_names: Vec<String> = variant_idents.iter().map(|v| v.to_string()).collect();
	let ordinals: Vec<i32> = (0..variant_idents.len() as i32).collect();

	let ordinal_match_arms = variant_idents.iter().zip(&ordinals).map(|(v, o)| quote!(#ident::#v => #o,));
	let from_ordinal_arms = variant_idents.iter().zip(&ordinals).map(|(v, o)| quote!(#o => #ident::#v,));

	quote! {
		impl lattice_marshal::Marshal for #ident {
			fn type_name(&self) -> &'static str {
				#type_name
			}

			fn write_fields(&self, _out: &mut lattice_marshal::OutputStream, _descriptor: &lattice_marshal::Descriptor) -> lattice_marshal::Result<()> {
				// Never called: `OutputStream::write_object`'s `Enum` branch
				// writes the ordinal directly and skips `write_fields` entirely.
				Ok(())
			}

			fn dyn_descriptor(&self, id_mapper: Option<&dyn lattice_marshal::IdMapper>) -> lattice_marshal::Descriptor {
				<Self as lattice_marshal::Reflected>::build_descriptor(id_mapper)
			}

			fn as_any(&self) -> &dyn std::any::Any {
				self
			}
		}

		impl lattice_marshal::Reflected for #ident {
			fn type_name() -> &'static str {
				#type_name
			}

			fn build_descriptor(id_mapper: Option<&dyn lattice_marshal::IdMapper>) -> lattice_marshal::Descriptor {
				lattice_marshal::Descriptor::build(
					#type_name,
					id_mapper,
					lattice_marshal::Capability::Enum,
					&[],
					vec![],
					vec![#(#variant_names),*],
					false,
					false,
					false,
					true,
					true,
				)
			}

			fn allocate_and_read(input: &mut lattice_marshal::InputStream, _descriptor: &lattice_marshal::Descriptor) -> lattice_marshal::Result<Self> {
				let ordinal = input.read_i32()?;
				Ok(match ordinal {
					#(#from_ordinal_arms)*
					other => return Err(lattice_marshal::Error::protocol_violation(format!("unknown ordinal {other} for enum `{}`", #type_name))),
				})
			}

			fn enum_ordinal(&self) -> i32 {
				match self {
					#(#ordinal_match_arms)*
				}
			}
		}
	}
}
