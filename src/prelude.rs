pub use crate::types::{TypeDescriptor, JavaType, ReferenceType, ArrayType, PrimitiveType};
pub use crate::descriptor::{MethodSignature, MethodData, FieldData};
pub use crate::mapping::{FastMappings, ClassMappings};
pub use crate::ranges::{RangeMap, FileLocation, FieldReference, MethodReference, MemberReference};
pub use crate::error::{Error, Result};
