use std::fmt::Debug;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Type {
    Int64,
    Bytes(u8),
}

impl Type {
    /// Get the size of the type in bytes.
    pub fn size(&self) -> usize {
        match self {
            Type::Int64 => 8,
            Type::Bytes(size) => {
                // The first byte is the actual length of the payload.
                1 + *size as usize
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Field {
    pub name: String,
    pub t: Type,
}

impl Field {
    pub fn new(name: &str, t: Type) -> Field {
        Field {
            name: name.to_string(),
            t,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn small_int_schema(width: usize) -> Self {
        let mut fields: Vec<Field> = Vec::new();
        for i in 0..width {
            let field = Field::new(&format!("int-column-{}", i), Type::Int64);
            fields.push(field);
        }

        Self::new(fields)
    }

    /// Get tuple size in bytes.
    pub fn get_tuple_size(&self) -> usize {
        let mut size = 0;
        for field in &self.fields {
            size += field.t.size();
        }
        size
    }

    pub fn get_field_pos(&self, field_name: &str) -> usize {
        for (i, field) in self.fields.iter().enumerate() {
            if field.name == field_name {
                return i;
            }
        }
        panic!("no field found");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_size() {
        let schema = Schema::small_int_schema(3);
        assert_eq!(schema.get_tuple_size(), 24);

        let schema = Schema::new(vec![
            Field::new("id", Type::Int64),
            Field::new("name", Type::Bytes(16)),
        ]);
        assert_eq!(schema.get_tuple_size(), 8 + 17);
    }

    #[test]
    fn test_field_pos() {
        let schema = Schema::small_int_schema(2);
        assert_eq!(schema.get_field_pos("int-column-1"), 1);
    }
}
