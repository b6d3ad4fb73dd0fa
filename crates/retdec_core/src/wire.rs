/// A value with a fixed textual form on the wire.
///
/// Implementations are generated by `wire_enum!`, which keeps the variant to
/// token table in a single exhaustive `match`.
pub trait WireToken: Sized + Copy + 'static {
    /// Every variant, in declaration order.
    const ALL: &'static [Self];

    /// The token sent to the service.
    fn token(self) -> &'static str;

    /// Looks a variant up by its token, ignoring ASCII case.
    fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.token().eq_ignore_ascii_case(token))
    }

    /// All tokens joined with `|`, for help and error messages.
    fn expected() -> String {
        Self::ALL
            .iter()
            .map(|v| v.token())
            .collect::<Vec<_>>()
            .join("|")
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $token:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::wire::WireToken for $name {
            const ALL: &'static [Self] = &[$( Self::$variant ),+];

            fn token(self) -> &'static str {
                match self {
                    $( Self::$variant => $token ),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(<Self as $crate::wire::WireToken>::token(*self))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::UnknownToken;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                <Self as $crate::wire::WireToken>::from_token(s).ok_or_else(|| {
                    $crate::error::UnknownToken {
                        kind: stringify!($name),
                        token: s.to_string(),
                        expected: <Self as $crate::wire::WireToken>::expected(),
                    }
                })
            }
        }
    };
}
