//! A trait with a default method and an overriding implementation —
//! the method picked depends on the implementing type, not on any
//! resolution order.

trait Greet {
    fn name(&self) -> &str;

    fn say_hello(&self) -> String {
        format!("Hello, {}!", self.name())
    }
}

struct Person {
    name: String,
}

impl Greet for Person {
    fn name(&self) -> &str {
        &self.name
    }
}

struct LoudPerson {
    name: String,
}

impl Greet for LoudPerson {
    fn name(&self) -> &str {
        &self.name
    }

    fn say_hello(&self) -> String {
        format!("HELLO, {}!!!", self.name().to_uppercase())
    }
}

fn main() {
    let person = Person {
        name: "World".to_string(),
    };
    let loud = LoudPerson {
        name: "World".to_string(),
    };

    println!("{}", person.say_hello());
    println!("{}", loud.say_hello());
}
