//! Source location of a log call

use serde::Serialize;

/// File, function and line of the code that emitted a log event.
///
/// Usually produced by [`call_site!`](crate::call_site) so that the values
/// are those of the caller, not of the logging crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite<'a> {
    pub file: &'a str,
    pub function: &'a str,
    pub line: u32,
    pub module_path: &'a str,
}

impl<'a> CallSite<'a> {
    pub const fn new(file: &'a str, function: &'a str, line: u32, module_path: &'a str) -> Self {
        Self {
            file,
            function,
            line,
            module_path,
        }
    }

    /// Final path component of `file`.
    pub fn file_name(&self) -> &'a str {
        self.file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.file)
    }
}

/// Turn the type name of a function item into the function's path.
#[doc(hidden)]
pub fn __function_path(type_name: &'static str) -> &'static str {
    let mut name = type_name.strip_suffix("::__f").unwrap_or(type_name);
    while let Some(outer) = name.strip_suffix("::{{closure}}") {
        name = outer;
    }
    name
}

/// Path of the enclosing function, e.g. `my_crate::net::connect`.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __f() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::core::call_site::__function_path(__type_name_of(__f))
    }};
}

/// [`CallSite`] of the macro invocation.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(
            ::std::file!(),
            $crate::function_name!(),
            ::std::line!(),
            ::std::module_path!(),
        )
    };
}
