//! Common error message constants and templates used throughout the runtime.

pub mod messages {
    pub const NO_BLOCK_GIVEN: &str = "no block given";
    pub const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

    pub fn undefined_method(name: &str, class_name: &str) -> String {
        format!("undefined method '{name}' for an instance of {class_name}")
    }

    pub fn wrong_argument_type(class_name: &str, expected: &str) -> String {
        format!("wrong argument type {class_name} (expected {expected})")
    }

    pub fn no_implicit_conversion(class_name: &str, expected: &str) -> String {
        format!("no implicit conversion of {class_name} into {expected}")
    }

    pub fn cannot_convert_to_array(class_name: &str, result_class: &str) -> String {
        format!("can't convert {class_name} to Array ({class_name}#to_ary gives {result_class})")
    }

    pub fn missing_keyword(name: &str) -> String {
        format!("missing keyword: :{name}")
    }

    pub fn wrong_number_of_arguments(given: usize, expected: usize) -> String {
        format!("wrong number of arguments (given {given}, expected {expected})")
    }

    pub fn uninitialized_constant(name: &str) -> String {
        format!("uninitialized constant {name}")
    }
}
