use thiserror::Error;

/// 名前から値に変換できなかった
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {name:?}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

/// バリアントごとに表記名を持つ列挙型を宣言する。
///
/// 表記名は `Display`、`FromStr`、serde で共通。記録ヘッダーと
/// `bt_dump.toml` で同じ綴りになる。
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::named::UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == s)
                    .ok_or_else(|| $crate::named::UnknownName {
                        kind: stringify!($name),
                        name: s.to_string(),
                    })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    named_enum! {
        pub enum Sample {
            First => "First",
            SecondThing => "Second_Thing",
        }
    }

    #[test]
    fn test_name_round_trip() {
        for v in Sample::ALL {
            assert_eq!(v.name().parse::<Sample>().unwrap(), *v);
        }
        assert_eq!(Sample::SecondThing.to_string(), "Second_Thing");
    }

    #[test]
    fn test_unknown_name() {
        let err = "Third".parse::<Sample>().unwrap_err();
        assert_eq!(err.kind, "Sample");
        assert_eq!(err.name, "Third");
    }

    #[test]
    fn test_serde_uses_name() {
        #[derive(serde::Deserialize)]
        struct Holder {
            value: Sample,
        }
        let holder: Holder = toml::from_str("value = \"Second_Thing\"").unwrap();
        assert_eq!(holder.value, Sample::SecondThing);
    }
}
