pub use enclose::*;

/// Collect paths with different value types into one list of descriptors.
#[macro_export]
macro_rules! paths {
    ($($path:expr),* $(,)?) => {
        [$($crate::PathDescriptor::from($path)),*]
    };
}

/// Implement `Trackable` for a type, optionally backed by a
/// `MemberNotifier` field that announces its member changes.
#[macro_export]
macro_rules! trackable {
    ($ty:ty) => {
        impl $crate::Trackable for $ty {}
    };
    ($ty:ty, $notifier:ident) => {
        impl $crate::Trackable for $ty {
            fn member_changes(&self) -> ::std::option::Option<&dyn $crate::ObservableMember> {
                ::std::option::Option::Some(&self.$notifier)
            }
        }
    };
}
