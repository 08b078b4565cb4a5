//! Script bodies for the self-hosted directives.
//!
//! Each body receives the directive pattern's captures under the parameter
//! names in [`Directive::head`] and calls the session builtins.

use super::Directive;

pub(super) fn script_body(directive: Directive) -> &'static str {
    match directive {
        Directive::If => "{ if (elif) return cond_elif(expr); return cond_if(expr); }",
        Directive::IfDef => "{ return rescan(cond_rewrite_ifdef(negate, rest)); }",
        Directive::Else => "{ return cond_else(junk); }",
        Directive::EndIf => "{ return cond_endif(junk); }",
        Directive::Inactive => "{ if (!cond_active()) return suppress(); }",
        // never used; #define stays native so definitions can bootstrap
        Directive::Define => "{ return; }",
        Directive::Undef => "{ return undef(name); }",
        Directive::Line => "{ return set_line(number, file); }",
        Directive::Include => "{ return include(expr); }",
        Directive::InclFolder => "{ return incl_folder(expr); }",
        Directive::Message => "{ return report(kind, text); }",
        Directive::Dump => "{ return dump(junk); }",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_function_body;

    #[test]
    fn every_body_parses() {
        for directive in Directive::ALL {
            assert!(
                parse_function_body(script_body(directive)).is_ok(),
                "{:?}",
                directive
            );
        }
    }
}
