//! Typed facades over [`ModelObject`](crate::ModelObject).

/// Declares a typed facade for a registered model type.
///
/// Each field generates a getter named after the field. Scalar fields also
/// get a `set_<field>` setter. The primary-key setter goes through
/// `set_unique`; every other setter goes through `set`. Collection fields
/// (`#[list]`, `#[set]`, `#[dictionary]`) return their live handle and
/// `#[backlinks]` fields return the linking objects.
///
/// ```
/// use modelbind_core::{model_facade, ObjectSchema, PropertyDescriptor, PropertyKind, SchemaRegistry};
///
/// model_facade! {
///     /// A person.
///     pub struct Person => "Person" {
///         #[primary_key]
///         id: i64 => "Id",
///         name: String => "Name",
///         #[list]
///         nicknames: String => "Nicknames",
///     }
/// }
///
/// let registry = SchemaRegistry::from_schemas([ObjectSchema::builder("Person")
///     .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
///     .property(PropertyDescriptor::scalar("Name", PropertyKind::String))
///     .property(PropertyDescriptor::list("Nicknames", PropertyKind::String))
///     .build()])
/// .unwrap();
///
/// let person = Person::new(&registry).unwrap();
/// person.set_id(42).unwrap();
/// person.set_name("Ada".to_string()).unwrap();
/// person.nicknames().unwrap().push("countess").unwrap();
/// assert_eq!(person.id().unwrap(), 42);
/// assert_eq!(person.name().unwrap(), "Ada");
/// ```
#[macro_export]
macro_rules! model_facade {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident => $type_name:literal {
            $( $(#[$kind:ident])? $field:ident : $ty:ty => $property:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        $vis struct $name($crate::ModelObject);

        impl $name {
            /// The registered type name.
            pub const TYPE_NAME: &'static str = $type_name;

            /// Creates an unmanaged instance from the registered schema.
            pub fn new(registry: &$crate::SchemaRegistry) -> $crate::CoreResult<Self> {
                registry.create(Self::TYPE_NAME).map(Self)
            }

            /// Wraps an existing object of this type.
            pub fn from_object(object: $crate::ModelObject) -> $crate::CoreResult<Self> {
                if object.type_name() != Self::TYPE_NAME {
                    return Err($crate::CoreError::type_mismatch(
                        "object",
                        Self::TYPE_NAME,
                        object.type_name(),
                    ));
                }
                Ok(Self(object))
            }

            /// The underlying object.
            pub fn object(&self) -> &$crate::ModelObject {
                &self.0
            }

            /// Unwraps the underlying object.
            pub fn into_object(self) -> $crate::ModelObject {
                self.0
            }

            $( $crate::model_facade!(@member [$($kind)?] $field, $ty, $property); )*
        }

        impl From<$name> for $crate::AnyValue {
            fn from(facade: $name) -> Self {
                $crate::AnyValue::Object(facade.0)
            }
        }
    };

    (@member [] $field:ident, $ty:ty, $property:literal) => {
        $crate::paste::paste! {
            #[doc = concat!("Reads `", $property, "`.")]
            pub fn $field(&self) -> $crate::CoreResult<$ty> {
                self.0.get_as($property)
            }

            #[doc = concat!("Writes `", $property, "`.")]
            pub fn [<set_ $field>](&self, value: $ty) -> $crate::CoreResult<()> {
                self.0.set($property, value)
            }
        }
    };

    (@member [primary_key] $field:ident, $ty:ty, $property:literal) => {
        $crate::paste::paste! {
            #[doc = concat!("Reads the primary key `", $property, "`.")]
            pub fn $field(&self) -> $crate::CoreResult<$ty> {
                self.0.get_as($property)
            }

            #[doc = concat!("Writes the primary key `", $property, "`.")]
            pub fn [<set_ $field>](&self, value: $ty) -> $crate::CoreResult<()> {
                self.0.set_unique($property, value)
            }
        }
    };

    (@member [list] $field:ident, $ty:ty, $property:literal) => {
        #[doc = concat!("The `", $property, "` list.")]
        pub fn $field(&self) -> $crate::CoreResult<$crate::List> {
            self.0.get_list($property)
        }
    };

    (@member [set] $field:ident, $ty:ty, $property:literal) => {
        #[doc = concat!("The `", $property, "` set.")]
        pub fn $field(&self) -> $crate::CoreResult<$crate::ValueSet> {
            self.0.get_set($property)
        }
    };

    (@member [dictionary] $field:ident, $ty:ty, $property:literal) => {
        #[doc = concat!("The `", $property, "` dictionary.")]
        pub fn $field(&self) -> $crate::CoreResult<$crate::Dictionary> {
            self.0.get_dictionary($property)
        }
    };

    (@member [backlinks] $field:ident, $ty:ty, $property:literal) => {
        #[doc = concat!("Objects linking here through `", $property, "`.")]
        pub fn $field(&self) -> $crate::CoreResult<Vec<$crate::ModelObject>> {
            self.0.backlinks($property)
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{
        CoreError, MemoryEngine, ObjectSchema, PropertyDescriptor, PropertyKind, SchemaRegistry,
    };
    use std::sync::Arc;

    model_facade! {
        struct Author => "Author" {
            #[primary_key]
            id: i64 => "Id",
            name: String => "Name",
            #[set]
            genres: String => "Genres",
            #[dictionary]
            links: String => "Links",
            #[backlinks]
            books: Book => "Books",
        }
    }

    model_facade! {
        struct Book => "Book" {
            title: String => "Title",
            author: Option<crate::ModelObject> => "Author",
            #[list]
            chapters: String => "Chapters",
        }
    }

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(
            SchemaRegistry::from_schemas([
                ObjectSchema::builder("Author")
                    .property(PropertyDescriptor::scalar("Id", PropertyKind::Int).primary_key())
                    .property(PropertyDescriptor::scalar("Name", PropertyKind::String))
                    .property(PropertyDescriptor::set("Genres", PropertyKind::String))
                    .property(PropertyDescriptor::dictionary("Links", PropertyKind::String))
                    .property(PropertyDescriptor::backlinks("Books", "Book", "Author"))
                    .build(),
                ObjectSchema::builder("Book")
                    .property(PropertyDescriptor::scalar("Title", PropertyKind::String))
                    .property(PropertyDescriptor::object("Author", "Author"))
                    .property(PropertyDescriptor::list("Chapters", PropertyKind::String))
                    .build(),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn typed_accessors_round_trip() {
        let registry = registry();
        let author = Author::new(&registry).unwrap();
        assert_eq!(author.id().unwrap(), 0);
        assert_eq!(author.name().unwrap(), "");

        author.set_id(42).unwrap();
        author.set_name("Le Guin".to_string()).unwrap();
        author.genres().unwrap().insert("fantasy").unwrap();
        author.links().unwrap().insert("home", "example.org").unwrap();

        assert_eq!(author.id().unwrap(), 42);
        assert_eq!(author.genres().unwrap().len().unwrap(), 1);
        assert!(matches!(
            author.object().set("Id", 43i64),
            Err(CoreError::PrimaryKeyImmutable { .. })
        ));
        assert_eq!(author.id().unwrap(), 42);
    }

    #[test]
    fn links_and_backlinks() {
        let registry = registry();
        let engine = MemoryEngine::new(Arc::clone(&registry));
        let author = Author::new(&registry).unwrap();
        author.set_id(1).unwrap();
        let book = Book::new(&registry).unwrap();
        book.set_title("Earthsea".to_string()).unwrap();
        book.set_author(Some(author.object().clone())).unwrap();
        book.chapters().unwrap().push("one").unwrap();

        assert!(matches!(
            author.books(),
            Err(CoreError::BacklinksUnmanaged { .. })
        ));
        engine.add(book.object(), false).unwrap();

        assert!(author.object().is_managed());
        assert_eq!(author.books().unwrap(), vec![book.object().clone()]);
        assert_eq!(book.author().unwrap(), Some(author.object().clone()));
    }

    #[test]
    fn from_object_checks_the_type() {
        let registry = registry();
        let book = registry.create("Book").unwrap();
        assert!(Author::from_object(book.clone()).is_err());
        assert_eq!(Book::from_object(book.clone()).unwrap().into_object(), book);
    }
}
